//! The table of recognized API calls.
//!
//! Each rule names a bare callee, the minimum number of positional
//! arguments it needs, the opcode it lowers to and how arguments map onto
//! operands. Calls below the minimum arity are dropped; extra arguments
//! are ignored.

use super::constants::Constant;
use crate::ast::Expression;
use crate::compiler::ir::{Op, pack_coords};
use crate::compiler::opcode::Opcode;

/// How one recognized call lowers.
#[derive(Debug, Clone, Copy)]
pub struct CallRule {
    /// Callee name as written in scripts
    pub name: &'static str,
    /// Minimum positional argument count
    pub arity: usize,
    /// The emitted opcode
    pub opcode: Opcode,
    lower: fn(Opcode, &[Expression]) -> Op,
}

impl CallRule {
    /// Lowers a call's positional arguments, or returns `None` if there
    /// are too few of them.
    pub fn apply(&self, args: &[Expression]) -> Option<Op> {
        if args.len() < self.arity {
            return None;
        }
        Some((self.lower)(self.opcode, args))
    }
}

macro_rules! rule {
    ($name:literal, $arity:literal, $opcode:ident, $lower:ident) => {
        CallRule {
            name: $name,
            arity: $arity,
            opcode: Opcode::$opcode,
            lower: $lower,
        }
    };
}

/// Every call the lowering pass recognizes.
pub static CALL_RULES: &[CallRule] = &[
    rule!("log", 1, Log, lower_a),
    rule!("broadcast", 1, Broadcast, lower_a),
    rule!("exec_cmd", 1, ExecCmd, lower_a),
    rule!("mul_speed", 2, MulEntitySpeed, lower_a_d),
    rule!("give_item", 3, GiveItem, lower_a_b_i),
    rule!("set_block", 4, SetBlock, lower_set_block),
    rule!("register_custom_mob", 2, RegisterCustomMob, lower_a_b),
    rule!("set_custom_mob_model", 2, SetCustomMobModel, lower_a_b),
    rule!("set_custom_mob_texture", 2, SetCustomMobTexture, lower_a_b),
    rule!("set_custom_mob_size", 2, SetCustomMobSize, lower_a_d),
    rule!("set_custom_mob_attr", 3, SetCustomMobAttr, lower_a_b_d),
    rule!("set_custom_mob_loot_table", 2, SetCustomMobLootTable, lower_a_b),
    rule!("set_custom_mob_equip", 3, SetCustomMobEquip, lower_equip),
    rule!("set_custom_mob_ai", 2, SetCustomMobAi, lower_a_b),
    rule!("spawn_custom_mob", 4, SpawnCustomMob, lower_spawn),
    rule!("remove_custom_mobs", 1, RemoveCustomMobs, lower_a),
];

/// Finds the rule for a callee name.
pub fn lookup(name: &str) -> Option<&'static CallRule> {
    CALL_RULES.iter().find(|rule| rule.name == name)
}

fn string(args: &[Expression], index: usize) -> String {
    Constant::evaluate(&args[index]).to_operand_string()
}

fn int(args: &[Expression], index: usize) -> i64 {
    Constant::evaluate(&args[index]).to_int()
}

fn float(args: &[Expression], index: usize) -> f64 {
    Constant::evaluate(&args[index]).to_float()
}

fn packed(args: &[Expression], first: usize) -> i64 {
    pack_coords(int(args, first), int(args, first + 1), int(args, first + 2))
}

fn lower_a(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode).with_a(string(args, 0))
}

fn lower_a_b(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 0))
        .with_b(string(args, 1))
}

fn lower_a_d(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 0))
        .with_d(float(args, 1))
}

fn lower_a_b_d(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 0))
        .with_b(string(args, 1))
        .with_d(float(args, 2))
}

// give_item(player, item_id, count)
fn lower_a_b_i(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 0))
        .with_b(string(args, 1))
        .with_i(int(args, 2))
}

// set_block(x, y, z, block_id)
fn lower_set_block(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 3))
        .with_i(packed(args, 0))
}

// spawn_custom_mob(mob_id, x, y, z)
fn lower_spawn(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 0))
        .with_i(packed(args, 1))
}

// set_custom_mob_equip(mob_id, slot, item_id): b = "slot|item_id"
fn lower_equip(opcode: Opcode, args: &[Expression]) -> Op {
    Op::new(opcode)
        .with_a(string(args, 0))
        .with_b(format!("{}|{}", string(args, 1), string(args, 2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Identifier, Literal};
    use std::collections::HashSet;

    fn s(value: &str) -> Expression {
        Expression::Literal(Literal::String(value.into()))
    }

    fn n(value: i64) -> Expression {
        Expression::Literal(Literal::Int(value))
    }

    fn name(value: &str) -> Expression {
        Expression::Name(Identifier::new(value))
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = CALL_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), CALL_RULES.len());
    }

    #[test]
    fn test_every_rule_emits_schema_conforming_ops() {
        for rule in CALL_RULES {
            let args: Vec<_> = (0..rule.arity).map(|i| s(&format!("arg{}", i))).collect();
            let op = rule.apply(&args).unwrap();
            assert_eq!(op.opcode, rule.opcode);
            assert!(
                rule.opcode.schema().is_some(),
                "{} has no operand schema",
                rule.opcode
            );
            assert!(op.conforms_to_schema(), "{} produced {:?}", rule.name, op);
        }
    }

    #[test]
    fn test_under_arity_is_rejected() {
        for rule in CALL_RULES {
            let args: Vec<_> = (0..rule.arity - 1).map(|_| n(1)).collect();
            assert!(rule.apply(&args).is_none(), "{} accepted too few args", rule.name);
        }
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        let op = lookup("log").unwrap().apply(&[s("a"), s("b")]).unwrap();
        assert_eq!(op, Op::new(Opcode::Log).with_a("a"));
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("launch_rocket").is_none());
        assert!(lookup("range").is_none());
    }

    #[test]
    fn test_give_item() {
        let op = lookup("give_item")
            .unwrap()
            .apply(&[s("Steve"), s("minecraft:diamond"), n(5)])
            .unwrap();
        assert_eq!(
            op,
            Op::new(Opcode::GiveItem)
                .with_a("Steve")
                .with_b("minecraft:diamond")
                .with_i(5)
        );
    }

    #[test]
    fn test_set_block_packs_coordinates() {
        let op = lookup("set_block")
            .unwrap()
            .apply(&[n(1), n(2), n(3), s("minecraft:stone")])
            .unwrap();
        assert_eq!(op.a, "minecraft:stone");
        assert_eq!(op.i, 1 | (2 << 16) | (3 << 32));
    }

    #[test]
    fn test_spawn_custom_mob_packs_trailing_coordinates() {
        let op = lookup("spawn_custom_mob")
            .unwrap()
            .apply(&[s("demon"), n(10), n(64), n(-5)])
            .unwrap();
        assert_eq!(op.a, "demon");
        assert_eq!(op.i, pack_coords(10, 64, -5));
    }

    #[test]
    fn test_equip_joins_slot_and_item() {
        let op = lookup("set_custom_mob_equip")
            .unwrap()
            .apply(&[s("demon"), s("mainhand"), s("minecraft:iron_sword")])
            .unwrap();
        assert_eq!(op.b, "mainhand|minecraft:iron_sword");
    }

    #[test]
    fn test_dynamic_arguments_default() {
        let op = lookup("mul_speed").unwrap().apply(&[name("kind"), name("factor")]).unwrap();
        assert_eq!(op.a, "");
        assert_eq!(op.d, 0.0);

        let op = lookup("set_custom_mob_attr")
            .unwrap()
            .apply(&[s("demon"), s("health"), n(200)])
            .unwrap();
        assert_eq!(op.d, 200.0);
    }
}
