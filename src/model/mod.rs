pub mod loss;
pub mod net;
pub mod persist;
pub mod train;
