//! Canonical location for shared symbolic math helpers.
//! Rule: generic reusable symbolic bitvector helpers belong in this file.

use z3::ast::BV;

/// Constant: 0 (256-bit)
pub fn zero<'ctx>(ctx: &'ctx z3::Context) -> BV<'ctx> {
    BV::from_u64(ctx, 0, 256)
}

/// Constant: Arbitrary u64 (256-bit)
pub fn val<'ctx>(ctx: &'ctx z3::Context, v: u64) -> BV<'ctx> {
    BV::from_u64(ctx, v, 256)
}
