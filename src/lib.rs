pub mod cache;
pub mod config;
pub mod csv;
pub mod error;
pub mod fetch;
pub mod lookup;
pub mod normalize;
pub mod number;
pub mod table;
pub mod view;

pub use cache::TableCache;
pub use config::{SheetConfig, TimestampSource};
pub use error::LookupError;
pub use fetch::{HttpSheetSource, SheetSource};
pub use lookup::{BalanceLookup, BalanceRecord, Tier};
pub use normalize::canonicalize;
pub use number::{format_locale_number, parse_locale_number};
pub use table::{resolve_columns, CellValue, ColumnIndexMap, SheetTable};
