//! L1 ambient data structures shared by the process table, scheduler queues, and
//! region/memlock tables: a `BTreeMap`-backed intrusive-style list, a fixed-bucket
//! hash table, and a small ring buffer.

pub mod hashtable;
pub mod intrusive_list;
pub mod ring_buffer;

pub use hashtable::HashTable;
pub use intrusive_list::IntrusiveList;
pub use ring_buffer::RingBuffer;
