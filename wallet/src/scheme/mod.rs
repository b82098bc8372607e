pub mod evm;
pub mod xrp;
