use alloy::primitives::{Address as aAddress, U256};
use revm::primitives::{Address as rAddress, U256 as rU256};
use z3::{
    ast::{Ast, BV},
    Context,
};

/// Width of an EVM account identity.
pub const ADDRESS_BITS: u32 = 160;
/// Width of an EVM stack/storage word.
pub const WORD_BITS: u32 = 256;

pub fn u256_from_bv(bv: &BV) -> Option<U256> {
    // Let Z3 do the constant folding
    let simplified = bv.simplify();

    // Fast path for small constants
    if let Some(val) = simplified.as_u64() {
        return Some(U256::from(val));
    }

    let s = simplified.to_string();
    crate::utils::hex::to_u256(&s)
}

pub fn bv_from_u256<'ctx>(ctx: &'ctx Context, val: U256) -> BV<'ctx> {
    // Pure, total mapping from a 256-bit integer to a 256-bit BV via big-endian limb packing.
    // Avoids BV::from_str, which can fail and silently degrade constants to zero.
    let bytes = val.to_be_bytes::<32>();
    let mut packed: Option<BV<'ctx>> = None;
    for chunk in bytes.chunks_exact(8) {
        let mut limb = [0u8; 8];
        limb.copy_from_slice(chunk);
        let part = BV::from_u64(ctx, u64::from_be_bytes(limb), 64);
        packed = Some(match packed {
            Some(acc) => acc.concat(&part),
            None => part,
        });
    }
    packed.unwrap_or_else(|| BV::from_u64(ctx, 0, WORD_BITS))
}

pub fn address_to_bv<'ctx>(ctx: &'ctx Context, addr: aAddress) -> BV<'ctx> {
    let u = U256::from_be_bytes(addr.into_word().0);
    bv_from_u256(ctx, u)
}

/// The 160-bit identity form of an address, comparable against sliced storage fields.
pub fn address_to_identity_bv<'ctx>(ctx: &'ctx Context, addr: aAddress) -> BV<'ctx> {
    address_to_bv(ctx, addr).extract(ADDRESS_BITS - 1, 0)
}

pub fn bv_to_address(bv: &BV) -> Option<aAddress> {
    if bv.get_size() == ADDRESS_BITS {
        return u256_from_bv(&bv.zero_ext(WORD_BITS - ADDRESS_BITS)).map(u256_to_address);
    }
    u256_from_bv(bv).map(u256_to_address)
}

pub fn u256_to_address(word: U256) -> aAddress {
    aAddress::from_slice(&word.to_be_bytes::<32>()[12..])
}

pub fn alloy_to_revm(addr: aAddress) -> rAddress {
    rAddress::from_slice(addr.as_slice())
}

pub fn revm_to_alloy(addr: rAddress) -> aAddress {
    aAddress::from_slice(addr.as_slice())
}

pub fn u256_to_revm(word: U256) -> rU256 {
    rU256::from_be_bytes(word.to_be_bytes::<32>())
}

pub fn u256_from_revm(word: rU256) -> U256 {
    U256::from_be_bytes(word.to_be_bytes::<32>())
}

/// Query-time solver limits. Timeouts surface as `SatResult::Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverLimits {
    pub timeout_ms: u32,
    pub rlimit: u32,
    pub random_seed: u32,
}

impl Default for SolverLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            rlimit: 200_000_000,
            random_seed: 42,
        }
    }
}

pub fn configure_solver(ctx: &Context, solver: &z3::Solver, limits: &SolverLimits) {
    let mut params = z3::Params::new(ctx);
    params.set_u32("timeout", limits.timeout_ms);
    params.set_u32("rlimit", limits.rlimit);
    params.set_u32("random_seed", limits.random_seed); // Deterministic by default
    solver.set_params(&params);
}
