//! Artifact naming and atomic output.
//!
//! A compiled module is written next to a temporary sibling and renamed into
//! place, so readers never observe a half-written `.pybc` file.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::Error;

/// File extension of compiled modules.
pub const EXTENSION: &str = "pybc";

/// Module name for a script path: its file stem, or `"module"` when the
/// path has none.
pub fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "module".to_string())
}

/// Output path for a script: `<stem>.pybc` in `out_dir`, or next to the
/// input when no directory is given.
pub fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let file_name = format!("{}.{}", module_name(input), EXTENSION);
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// Output paths for a batch of inputs, in input order.
///
/// Inputs that would write the same artifact (`a/mod.py` and `b/mod.py`
/// into one output directory) all get an [`Error::Config`] naming each
/// other, so nothing is overwritten.
pub fn plan_outputs<P: AsRef<Path>>(
    inputs: &[P],
    out_dir: Option<&Path>,
) -> Vec<crate::Result<PathBuf>> {
    let outputs: Vec<PathBuf> = inputs
        .iter()
        .map(|input| output_path(input.as_ref(), out_dir))
        .collect();

    let mut writers: FxHashMap<&Path, Vec<&Path>> = FxHashMap::default();
    for (input, output) in inputs.iter().zip(&outputs) {
        writers.entry(output.as_path()).or_default().push(input.as_ref());
    }

    outputs
        .iter()
        .map(|output| match writers.get(output.as_path()) {
            Some(sources) if sources.len() > 1 => {
                let names: Vec<String> =
                    sources.iter().map(|p| p.display().to_string()).collect();
                Err(Error::Config(format!(
                    "inputs {} would all write {}",
                    names.join(", "),
                    output.display()
                )))
            }
            _ => Ok(output.clone()),
        })
        .collect()
}

/// The temporary sibling used while `path` is being written.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Writes `bytes` to `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> crate::Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_is_stem() {
        assert_eq!(module_name(Path::new("mods/zombies.py")), "zombies");
        assert_eq!(module_name(Path::new("script")), "script");
        assert_eq!(module_name(Path::new("/")), "module");
    }

    #[test]
    fn test_output_path() {
        let input = Path::new("mods/zombies.py");
        assert_eq!(output_path(input, None), PathBuf::from("mods/zombies.pybc"));
        assert_eq!(
            output_path(input, Some(Path::new("build"))),
            PathBuf::from("build/zombies.pybc")
        );
    }

    #[test]
    fn test_plan_outputs_flags_shared_artifacts() {
        let inputs = ["a/mod.py", "b/mod.py", "c/other.py"];
        let plan = plan_outputs(&inputs, Some(Path::new("build")));

        for result in &plan[..2] {
            let Err(Error::Config(message)) = result else {
                panic!("expected a config error, got {:?}", result);
            };
            assert!(message.contains("a/mod.py"));
            assert!(message.contains("b/mod.py"));
            assert!(message.contains("build/mod.pybc"));
        }
        assert_eq!(plan[2].as_ref().unwrap(), &PathBuf::from("build/other.pybc"));
    }

    #[test]
    fn test_plan_outputs_next_to_inputs() {
        let plan = plan_outputs(&["a/mod.py", "b/mod.py"], None);
        assert_eq!(plan[0].as_ref().unwrap(), &PathBuf::from("a/mod.pybc"));
        assert_eq!(plan[1].as_ref().unwrap(), &PathBuf::from("b/mod.pybc"));

        let plan = plan_outputs(&["mods/x.py", "mods/x.py"], None);
        assert!(plan.iter().all(|r| matches!(r, Err(Error::Config(_)))));
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path(Path::new("build/zombies.pybc")),
            PathBuf::from("build/.zombies.pybc.tmp")
        );
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pybc");
        fs::write(&path, b"old").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_atomic_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.pybc");
        assert!(matches!(write_atomic(&path, b"x"), Err(crate::Error::Io(_))));
    }
}
