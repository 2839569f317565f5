pub mod spinlock;

pub use spinlock::{pop_off, push_off, Spinlock};
