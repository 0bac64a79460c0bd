pub mod cache;
pub mod records;
pub mod schema;
pub mod store;

pub use cache::IdCache;
pub use records::{EcotypeRead, GeneReadRow, GeneRow, ReadKey, RefLengthRow};
pub use schema::NamedTable;
pub use store::{DbError, GeneReadsDb, LengthSource, WriteMode};
