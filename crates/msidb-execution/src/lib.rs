//! msidb Execution - View execution layer
//!
//! Views are compiled query-plan nodes. A table view scans one stored
//! table; an alter view wraps a table view to add columns or to change how
//! long the table stays alive. `Query` drives a view tree.

pub mod alter_view;
pub mod context;
pub mod query;
pub mod table_view;
pub mod view;

pub use alter_view::{AlterView, Hold};
pub use context::ExecutionContext;
pub use query::Query;
pub use table_view::TableView;
pub use view::{MatchCursor, ModifyMode, View};
