//! Vulnerability predicates over a storage write.
//!
//! A detector's predicate is the conjunction of independent [`ConditionTerm`]s, so a new
//! defect class is a new term list rather than a new detector.

use alloy::primitives::U256;
use std::fmt;
use z3::ast::{Ast, Bool, BV};
use z3::Context;

use crate::error::InsufficientState;
use crate::symbolic::actors::ActorIdentity;
use crate::symbolic::extract::{self, FieldLayout, ProtectedField, StoreOperands};
use crate::symbolic::state::StateSnapshot;
use crate::symbolic::z3_ext::{bv_from_u256, ADDRESS_BITS, WORD_BITS};

/// Immutable boolean expression; every combinator returns a new one.
#[derive(Debug, Clone)]
pub struct Condition<'ctx>(Bool<'ctx>);

impl<'ctx> Condition<'ctx> {
    pub fn new(expr: Bool<'ctx>) -> Self {
        Self(expr)
    }

    pub fn constant(ctx: &'ctx Context, value: bool) -> Self {
        Self(Bool::from_bool(ctx, value))
    }

    pub fn and(&self, other: &Self) -> Self {
        Self(Bool::and(self.0.get_ctx(), &[&self.0, &other.0]))
    }

    pub fn or(&self, other: &Self) -> Self {
        Self(Bool::or(self.0.get_ctx(), &[&self.0, &other.0]))
    }

    pub fn not(&self) -> Self {
        Self(self.0.not())
    }

    /// Conjunction of `conditions`; the empty conjunction is `true`.
    pub fn all(ctx: &'ctx Context, conditions: &[Condition<'ctx>]) -> Self {
        let exprs: Vec<&Bool<'ctx>> = conditions.iter().map(|c| &c.0).collect();
        Self(Bool::and(ctx, &exprs))
    }

    pub fn expr(&self) -> &Bool<'ctx> {
        &self.0
    }

    pub fn into_expr(self) -> Bool<'ctx> {
        self.0
    }
}

/// What a storage-write predicate gets to look at: the snapshot and the decoded SSTORE
/// operands.
pub struct WriteView<'a, 'ctx> {
    pub snapshot: &'a StateSnapshot<'ctx>,
    pub operands: StoreOperands<'ctx>,
}

impl<'a, 'ctx> WriteView<'a, 'ctx> {
    pub fn from_snapshot(snapshot: &'a StateSnapshot<'ctx>) -> Result<Self, InsufficientState> {
        let operands = extract::store_operands(snapshot)?;
        Ok(Self { snapshot, operands })
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.snapshot.ctx
    }
}

pub trait ConditionTerm: Send + Sync {
    fn describe(&self) -> String;

    fn condition<'ctx>(
        &self,
        view: &WriteView<'_, 'ctx>,
    ) -> Result<Condition<'ctx>, InsufficientState>;
}

impl fmt::Debug for dyn ConditionTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Evaluate every term against `view` and conjoin them. The first term that cannot be built
/// aborts the whole predicate.
pub fn conjoin<'ctx>(
    terms: &[Box<dyn ConditionTerm>],
    view: &WriteView<'_, 'ctx>,
) -> Result<Condition<'ctx>, InsufficientState> {
    let parts = terms
        .iter()
        .map(|term| term.condition(view))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Condition::all(view.ctx(), &parts))
}

/// The write lands on `slot`.
#[derive(Debug, Clone, Copy)]
pub struct WriteTargetIs {
    pub slot: U256,
}

impl ConditionTerm for WriteTargetIs {
    fn describe(&self) -> String {
        format!("write target == slot {:#x}", self.slot)
    }

    fn condition<'ctx>(
        &self,
        view: &WriteView<'_, 'ctx>,
    ) -> Result<Condition<'ctx>, InsufficientState> {
        let slot = bv_from_u256(view.ctx(), self.slot);
        Ok(Condition::new(view.operands.slot._eq(&slot)))
    }
}

/// Before the write, the protected field does not already hold `actor`.
#[derive(Debug, Clone, Copy)]
pub struct StoredFieldIsNot {
    pub field: ProtectedField,
    pub actor: ActorIdentity,
}

impl ConditionTerm for StoredFieldIsNot {
    fn describe(&self) -> String {
        format!(
            "slot {:#x}[{}..+{}] != {}",
            self.field.slot,
            self.field.layout.offset_bits(),
            self.field.layout.width_bits(),
            self.actor.name
        )
    }

    fn condition<'ctx>(
        &self,
        view: &WriteView<'_, 'ctx>,
    ) -> Result<Condition<'ctx>, InsufficientState> {
        let word = extract::storage_cell(view.snapshot, self.field.slot)?;
        let current = identity_field(&self.field.layout, &word)?;
        Ok(Condition::new(
            current._eq(&self.actor.identity(view.ctx())).not(),
        ))
    }
}

/// The value being written places `actor` in the field described by `layout`.
#[derive(Debug, Clone, Copy)]
pub struct WrittenFieldIs {
    pub layout: FieldLayout,
    pub actor: ActorIdentity,
}

impl ConditionTerm for WrittenFieldIs {
    fn describe(&self) -> String {
        format!(
            "written value[{}..+{}] == {}",
            self.layout.offset_bits(),
            self.layout.width_bits(),
            self.actor.name
        )
    }

    fn condition<'ctx>(
        &self,
        view: &WriteView<'_, 'ctx>,
    ) -> Result<Condition<'ctx>, InsufficientState> {
        let written = identity_field(&self.layout, &view.operands.value)?;
        Ok(Condition::new(written._eq(&self.actor.identity(view.ctx()))))
    }
}

/// The executing transaction was sent by `actor`.
#[derive(Debug, Clone, Copy)]
pub struct SenderIs {
    pub actor: ActorIdentity,
}

impl ConditionTerm for SenderIs {
    fn describe(&self) -> String {
        format!("sender == {}", self.actor.name)
    }

    fn condition<'ctx>(
        &self,
        view: &WriteView<'_, 'ctx>,
    ) -> Result<Condition<'ctx>, InsufficientState> {
        let sender = &view.snapshot.environment.sender;
        let actual = sender.get_size();
        if actual != WORD_BITS {
            return Err(InsufficientState::OperandWidth {
                operand: "sender",
                expected: WORD_BITS,
                actual,
            });
        }
        Ok(Condition::new(sender._eq(&self.actor.word(view.ctx()))))
    }
}

fn identity_field<'ctx>(
    layout: &FieldLayout,
    word: &BV<'ctx>,
) -> Result<BV<'ctx>, InsufficientState> {
    if layout.width_bits() != ADDRESS_BITS {
        return Err(InsufficientState::OperandWidth {
            operand: "identity field",
            expected: ADDRESS_BITS,
            actual: layout.width_bits(),
        });
    }
    layout.slice(word)
}
