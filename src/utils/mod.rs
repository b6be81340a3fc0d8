pub mod key;

pub(crate) mod scoped_timer;
