pub mod publish;
pub mod sns;
