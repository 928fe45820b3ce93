use alloy::primitives::Address;
use z3::ast::BV;
use z3::Context;

use crate::symbolic::z3_ext::{address_to_bv, address_to_identity_bv};

/// A distinguished role used inside vulnerability predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorIdentity {
    pub name: &'static str,
    pub address: Address,
}

impl ActorIdentity {
    pub const fn new(name: &'static str, address: Address) -> Self {
        Self { name, address }
    }

    /// 160-bit identity term, comparable against sliced address fields.
    pub fn identity<'ctx>(&self, ctx: &'ctx Context) -> BV<'ctx> {
        address_to_identity_bv(ctx, self.address)
    }

    /// Zero-extended 256-bit word form, as it appears on the stack.
    pub fn word<'ctx>(&self, ctx: &'ctx Context) -> BV<'ctx> {
        address_to_bv(ctx, self.address)
    }
}

const fn repeating(pattern: [u8; 2]) -> Address {
    let mut bytes = [0u8; 20];
    let mut i = 0;
    while i < 20 {
        bytes[i] = pattern[i % 2];
        i += 1;
    }
    Address::new(bytes)
}

/// Canonical sentinel identities shared by every detection module.
pub struct Actors;

impl Actors {
    pub const CREATOR: ActorIdentity = ActorIdentity::new("creator", repeating([0xAF, 0xFE]));
    pub const ATTACKER: ActorIdentity = ActorIdentity::new("attacker", Address::new([0xAA; 20]));
    pub const SOMEGUY: ActorIdentity = ActorIdentity::new("someguy", repeating([0xBE, 0xEF]));
}
