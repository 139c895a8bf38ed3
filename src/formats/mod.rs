pub mod bif;
pub mod erf;
pub mod gff;
pub mod key;
pub mod set;
