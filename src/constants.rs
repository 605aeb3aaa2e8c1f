// Engine-wide constants. Thresholds here mirror what the on-chain programs
// and the ledger's transaction-size ceiling actually enforce; downstream
// components (claim enumeration, UI) read these rather than re-deriving them.

/// Basis-point denominator: 10_000 bps = 100% of a split.
pub const BPS_DENOMINATOR: u16 = 10_000;

// Recipient limits
pub const MIN_RECIPIENTS: usize = 1;
pub const MAX_RECIPIENTS: usize = 100;

/// Recipient count above which raw addresses no longer fit inline in the
/// registration transaction. Past this, addresses are registered in an
/// on-ledger lookup table and referenced by handle instead.
pub const NON_BATCHED_CAPACITY: usize = 15;

/// Addresses a single extend transaction can carry under the ledger's
/// per-transaction byte ceiling. One extend per batch, so this is also the
/// per-batch size.
pub const BATCH_EXTEND_CAPACITY: usize = 30;

/// Slots a newly created lookup table must be observed as confirmed before
/// the ledger accepts an extension. Extending earlier is rejected on-chain.
pub const BATCH_SETTLING_SLOTS: u64 = 1;

/// Platform convention for a partner overlay skim (25%). A policy default
/// only; the overlay share is caller-supplied and validated, never assumed.
pub const DEFAULT_PARTNER_SHARE_BPS: u16 = 2_500;
