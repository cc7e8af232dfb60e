use inventorydb_core::ResultSet;

use crate::state::ResultMetadata;

pub const EMPTY_RESULT_MESSAGE: &str =
    "Query executed successfully, but returned 0 rows. This means no data matched your criteria.";

/// Truncate to the display cap and describe what the user is looking at.
///
/// Row order is preserved. `capped` depends only on `total_rows`.
pub fn shape(
    rows: &ResultSet,
    total_rows: usize,
    display_cap: usize,
    execution_time: f64,
) -> (ResultSet, ResultMetadata) {
    let display = rows.head(display_cap);
    let capped = total_rows > display_cap;

    let result_message = if total_rows == 0 {
        Some(EMPTY_RESULT_MESSAGE.to_string())
    } else if capped {
        Some(format!(
            "Showing {display_cap} of {total_rows} rows. Query returned more data than can be displayed."
        ))
    } else {
        None
    };

    let metadata = ResultMetadata {
        total_rows,
        displayed_rows: display.len(),
        execution_time,
        capped,
        result_message,
    };
    (display, metadata)
}
