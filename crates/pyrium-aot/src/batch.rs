//! Batch compilation drivers.
//!
//! - [`AsyncCompiler`] (feature `async`) reads and writes files with tokio
//!   and compiles several scripts concurrently.
//! - [`ParallelCompiler`] (feature `parallel`) compiles in-memory sources on
//!   a rayon thread pool.
//!
//! Both return one result per input, in input order. A failure in one input
//! does not affect the others.
//!
//! # Example
//!
//! ```ignore
//! use pyrium_aot::batch::AsyncCompiler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let compiler = AsyncCompiler::default();
//!     for result in compiler.compile_files(&["mods/a.py", "mods/b.py"]).await {
//!         println!("{:?}", result);
//!     }
//! }
//! ```

#[cfg(feature = "async")]
use std::path::{Path, PathBuf};
#[cfg(feature = "async")]
use tokio::fs;

use crate::{Compiler, Config, Result};
#[cfg(feature = "parallel")]
use crate::{Error, Module};

/// Compiles script files with async I/O.
#[cfg(feature = "async")]
#[derive(Debug, Clone, Default)]
pub struct AsyncCompiler {
    compiler: Compiler,
    out_dir: Option<PathBuf>,
}

#[cfg(feature = "async")]
impl AsyncCompiler {
    /// Wraps a compiler; artifacts go next to their inputs.
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            out_dir: None,
        }
    }

    /// Creates a driver from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            compiler: Compiler::from_config(config),
            out_dir: config.out_dir.clone(),
        }
    }

    /// Sends artifacts to `dir` instead of next to their inputs.
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    /// Compiles one file and writes its artifact. Returns the artifact
    /// path.
    ///
    /// Parsing and lowering run inline; only the file I/O is awaited.
    pub async fn compile_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let output = crate::artifact::output_path(path, self.out_dir.as_deref());
        self.compile_to(path, output).await
    }

    async fn compile_to(&self, path: &Path, output: PathBuf) -> Result<PathBuf> {
        let source = fs::read_to_string(path).await?;
        let bytes = self
            .compiler
            .compile_source(&source, &crate::artifact::module_name(path))?;
        write_artifact(path, output, &bytes).await
    }

    /// Compiles several files concurrently.
    ///
    /// Inputs that would write the same artifact fail with
    /// [`Error::Config`](crate::Error::Config) before any file is read.
    pub async fn compile_files(&self, paths: &[impl AsRef<Path>]) -> Vec<Result<PathBuf>> {
        let plan = crate::artifact::plan_outputs(paths, self.out_dir.as_deref());
        let futures: Vec<_> = paths
            .iter()
            .zip(plan)
            .map(|(path, output)| async move {
                match output {
                    Ok(output) => self.compile_to(path.as_ref(), output).await,
                    Err(e) => Err(e),
                }
            })
            .collect();

        futures::future::join_all(futures).await
    }

    /// Compiles several files, reading and writing with tokio while
    /// `workers` lowers and encodes them on its thread pool.
    #[cfg(feature = "parallel")]
    pub async fn compile_files_on(
        &self,
        workers: &ParallelCompiler,
        paths: &[impl AsRef<Path>],
    ) -> Vec<Result<PathBuf>> {
        let plan = crate::artifact::plan_outputs(paths, self.out_dir.as_deref());

        let reads: Vec<_> = paths
            .iter()
            .zip(&plan)
            .map(|(path, output)| async move {
                match output {
                    Ok(_) => Some(fs::read_to_string(path.as_ref()).await),
                    Err(_) => None,
                }
            })
            .collect();
        let sources = futures::future::join_all(reads).await;

        let names: Vec<String> = paths
            .iter()
            .map(|p| crate::artifact::module_name(p.as_ref()))
            .collect();
        let mut compiled = {
            let jobs: Vec<(&str, &str)> = names
                .iter()
                .zip(&sources)
                .filter_map(|(name, source)| match source {
                    Some(Ok(source)) => Some((name.as_str(), source.as_str())),
                    _ => None,
                })
                .collect();
            workers.compile_sources(&jobs).into_iter()
        };

        let mut writes = Vec::with_capacity(paths.len());
        for ((path, output), source) in paths.iter().zip(plan).zip(sources) {
            let bytes = match source {
                Some(Ok(_)) => compiled.next(),
                _ => None,
            };
            writes.push(async move {
                match (output, source, bytes) {
                    (Err(e), _, _) => Err(e),
                    (_, Some(Err(e)), _) => Err(crate::Error::Io(e)),
                    (_, _, Some(Err(e))) => Err(e),
                    (Ok(output), _, Some(Ok(bytes))) => {
                        write_artifact(path.as_ref(), output, &bytes).await
                    }
                    (Ok(_), _, None) => Err(crate::Error::Config(format!(
                        "no compiled output for {}",
                        path.as_ref().display()
                    ))),
                }
            });
        }

        futures::future::join_all(writes).await
    }
}

#[cfg(feature = "async")]
async fn write_artifact(input: &Path, output: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
    let tmp = crate::artifact::temp_path(&output);
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, &output).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes = bytes.len(),
        "wrote module"
    );
    Ok(output)
}

/// Compiles sources on a thread pool.
#[cfg(feature = "parallel")]
pub struct ParallelCompiler {
    compiler: Compiler,
    /// Thread pool for CPU-bound work
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl ParallelCompiler {
    /// Creates a parallel compiler with the default number of threads.
    pub fn new(compiler: Compiler) -> Result<Self> {
        Self::build(compiler, None)
    }

    /// Creates a parallel compiler with a specific number of threads.
    pub fn with_threads(compiler: Compiler, num_threads: usize) -> Result<Self> {
        Self::build(compiler, Some(num_threads))
    }

    /// Creates a parallel compiler from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(Compiler::from_config(config), config.threads)
    }

    fn build(compiler: Compiler, num_threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::Config(format!("cannot start thread pool: {}", e)))?;
        Ok(Self { compiler, pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Lowers `(module_name, source)` pairs in parallel.
    pub fn lower_sources(&self, sources: &[(&str, &str)]) -> Vec<Result<Module>> {
        use rayon::prelude::*;

        self.pool.install(|| {
            sources
                .par_iter()
                .map(|(name, source)| self.compiler.lower_source(source, name))
                .collect()
        })
    }

    /// Compiles `(module_name, source)` pairs to PYBC bytes in parallel.
    pub fn compile_sources(&self, sources: &[(&str, &str)]) -> Vec<Result<Vec<u8>>> {
        use rayon::prelude::*;

        self.pool.install(|| {
            sources
                .par_iter()
                .map(|(name, source)| self.compiler.compile_source(source, name))
                .collect()
        })
    }
}

#[cfg(all(test, feature = "async"))]
mod async_tests {
    use super::*;
    use crate::Error;

    const SCRIPT: &str = "def on_tick():\n    broadcast('hello')\n";

    #[tokio::test]
    async fn test_compile_file_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("greeter.py");
        std::fs::write(&input, SCRIPT).unwrap();

        let output = AsyncCompiler::default().compile_file(&input).await.unwrap();
        assert_eq!(output, dir.path().join("greeter.pybc"));

        let module = crate::pybc::decode(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(module.name, "greeter");
        assert_eq!(module.string_pool, vec!["hello".to_string()]);
        assert!(!crate::artifact::temp_path(&output).exists());
    }

    #[tokio::test]
    async fn test_compile_files_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let good = dir.path().join("good.py");
        let bad = dir.path().join("bad.py");
        std::fs::write(&good, SCRIPT).unwrap();
        std::fs::write(&bad, "def on_tick(\n").unwrap();
        let missing = dir.path().join("missing.py");

        let compiler = AsyncCompiler::default().with_out_dir(&out);
        let results = compiler.compile_files(&[&good, &bad, &missing]).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &out.join("good.pybc"));
        assert!(matches!(results[1], Err(Error::Syntax { .. })));
        assert!(matches!(results[2], Err(Error::Io(_))));
        assert!(!out.join("bad.pybc").exists());
    }

    #[tokio::test]
    async fn test_compile_files_rejects_shared_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        for sub in ["a", "b"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        std::fs::create_dir(&out).unwrap();

        let first = dir.path().join("a").join("mod.py");
        let second = dir.path().join("b").join("mod.py");
        let other = dir.path().join("a").join("other.py");
        for path in [&first, &second, &other] {
            std::fs::write(path, SCRIPT).unwrap();
        }

        let compiler = AsyncCompiler::default().with_out_dir(&out);
        let results = compiler.compile_files(&[&first, &second, &other]).await;

        assert!(matches!(results[0], Err(Error::Config(_))));
        assert!(matches!(results[1], Err(Error::Config(_))));
        assert_eq!(results[2].as_ref().unwrap(), &out.join("other.pybc"));
        assert!(!out.join("mod.pybc").exists());
    }

    #[tokio::test]
    async fn test_from_config_uses_out_dir_and_entry_points() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("load.py");
        std::fs::write(&input, "def on_load():\n    log('up')\n").unwrap();

        let mut config = Config::default();
        config.set("entry_points", "on_load").unwrap();
        config.out_dir = Some(dir.path().join("build"));
        std::fs::create_dir(dir.path().join("build")).unwrap();

        let output = AsyncCompiler::from_config(&config)
            .compile_file(&input)
            .await
            .unwrap();
        let module = crate::pybc::decode(&std::fs::read(output).unwrap()).unwrap();
        assert_eq!(module.functions[0].name, "on_load");
    }
}

#[cfg(all(test, feature = "async", feature = "parallel"))]
mod pooled_tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_compile_files_on_pool() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.py");
        let bad = dir.path().join("bad.py");
        std::fs::write(&good, "def on_tick():\n    log('pooled')\n").unwrap();
        std::fs::write(&bad, "def on_tick(\n").unwrap();
        let missing = dir.path().join("missing.py");

        let workers = ParallelCompiler::with_threads(Compiler::new(), 2).unwrap();
        let results = AsyncCompiler::default()
            .compile_files_on(&workers, &[&good, &bad, &missing])
            .await;

        let output = results[0].as_ref().unwrap();
        assert_eq!(output, &dir.path().join("good.pybc"));
        let module = crate::pybc::decode(&std::fs::read(output).unwrap()).unwrap();
        assert_eq!(module.string_pool, vec!["pooled".to_string()]);
        assert!(matches!(results[1], Err(Error::Syntax { .. })));
        assert!(matches!(results[2], Err(Error::Io(_))));
        assert!(!dir.path().join("bad.pybc").exists());
    }

    #[tokio::test]
    async fn test_compile_files_on_pool_rejects_shared_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("twice.py");
        std::fs::write(&input, "def on_tick():\n    pass\n").unwrap();

        let workers = ParallelCompiler::new(Compiler::new()).unwrap();
        let results = AsyncCompiler::default()
            .compile_files_on(&workers, &[&input, &input])
            .await;

        assert!(results.iter().all(|r| matches!(r, Err(Error::Config(_)))));
        assert!(!dir.path().join("twice.pybc").exists());
    }
}

#[cfg(all(test, feature = "parallel"))]
mod parallel_tests {
    use super::*;

    #[test]
    fn test_compile_sources_preserves_order() {
        let compiler = ParallelCompiler::with_threads(Compiler::new(), 4).unwrap();
        let sources: Vec<(String, String)> = (0..32)
            .map(|n| {
                (
                    format!("m{}", n),
                    format!("def on_tick():\n    log('message {}')\n", n),
                )
            })
            .collect();
        let pairs: Vec<(&str, &str)> = sources
            .iter()
            .map(|(name, src)| (name.as_str(), src.as_str()))
            .collect();

        let results = compiler.compile_sources(&pairs);
        assert_eq!(results.len(), 32);
        for (n, result) in results.into_iter().enumerate() {
            let module = crate::pybc::decode(&result.unwrap()).unwrap();
            assert_eq!(module.name, format!("m{}", n));
            assert_eq!(module.string_pool, vec![format!("message {}", n)]);
        }
    }

    #[test]
    fn test_lower_sources_matches_sequential() {
        let compiler = ParallelCompiler::new(Compiler::new()).unwrap();
        let src = "def on_tick():\n    if x > 1:\n        exec_cmd('time set day')\n";
        let results = compiler.lower_sources(&[("a", src), ("b", "def (\n")]);

        assert_eq!(
            results[0].as_ref().unwrap(),
            &Compiler::new().lower_source(src, "a").unwrap()
        );
        assert!(results[1].is_err());
    }

    #[test]
    fn test_from_config_threads() {
        let mut config = Config::default();
        config.threads = Some(2);
        assert_eq!(ParallelCompiler::from_config(&config).unwrap().threads(), 2);
    }
}
