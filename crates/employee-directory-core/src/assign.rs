use crate::error::DirectoryError;
use crate::model::{Category, EmployeeId};

/// Picks the department for an employee: `categories[id mod len]`.
///
/// Stable for a fixed id and a fixed list. Two fetches of the category list that
/// differ in length or order can assign different departments to the same employee;
/// callers must not paper over that.
///
/// # Errors
/// Returns [`DirectoryError::EmptyCategoryList`] when `categories` is empty.
pub fn assign_department(
    employee_id: EmployeeId,
    categories: &[Category],
) -> Result<&Category, DirectoryError> {
    if categories.is_empty() {
        return Err(DirectoryError::EmptyCategoryList);
    }
    let len = u64::try_from(categories.len()).unwrap_or(u64::MAX);
    // index < len, so it always fits back into usize
    let index = usize::try_from(employee_id.0 % len).unwrap_or(0);
    categories.get(index).ok_or(DirectoryError::EmptyCategoryList)
}
