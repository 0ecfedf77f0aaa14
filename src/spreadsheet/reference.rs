//! A1-style cell references

/// Rows in an Excel worksheet grid (1..=1048576)
pub(crate) const MAX_ROWS: usize = 1_048_576;

/// Columns in an Excel worksheet grid (A..=XFD)
pub(crate) const MAX_COLS: usize = 16_384;

/// Whether 0-based indexes fall inside the worksheet grid
pub(crate) fn is_within_grid(row: usize, col: usize) -> bool {
    row < MAX_ROWS && col < MAX_COLS
}

/// Converts column letters ("A", "AB") to a 0-based column index.
/// Returns None for empty or non-alphabetic input.
pub(crate) fn col_to_index(col: &str) -> Option<usize> {
    if col.is_empty() {
        return None;
    }
    col.chars().try_fold(0usize, |index, letter| {
        let letter = letter.to_ascii_uppercase();
        if letter.is_ascii_uppercase() {
            let digit = (letter as u8 - b'A') as usize + 1;
            index.checked_mul(26)?.checked_add(digit)
        } else {
            None
        }
    }).map(|index| index - 1)
}

/// Converts a 1-based row number ("1", "42") to a 0-based row index.
pub(crate) fn row_to_index(row: &str) -> Option<usize> {
    row.parse::<usize>().ok()?.checked_sub(1)
}

/// Splits a cell reference such as "B2" into its 0-based (row, col) indexes.
/// Absolute markers ("$B$2") are ignored.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let position = reference.find(|c: char| c.is_ascii_digit())?;
    let col = col_to_index(&reference[..position])?;
    let row = row_to_index(&reference[position..])?;
    Some((row, col))
}

/// Formats 0-based indexes as an A1-style reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    let mut col = col + 1;
    while col > 0 {
        let remainder = (col - 1) % 26;
        letters.push(b'A' + remainder as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(col_to_index("A"), Some(0));
        assert_eq!(col_to_index("z"), Some(25));
        assert_eq!(col_to_index("AA"), Some(26));
        assert_eq!(col_to_index("XFD"), Some(16_383));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn row_numbers() {
        assert_eq!(row_to_index("1"), Some(0));
        assert_eq!(row_to_index("1048576"), Some(1_048_575));
        assert_eq!(row_to_index("0"), None);
        assert_eq!(row_to_index(""), None);
    }

    #[test]
    fn references() {
        assert_eq!(reference_to_index("B2"), Some((1, 1)));
        assert_eq!(reference_to_index("$AB$10"), Some((9, 27)));
        assert_eq!(reference_to_index("B"), None);
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(9, 27), "AB10");
        assert_eq!(index_to_reference(0, 16_383), "XFD1");
    }

    #[test]
    fn grid_limits() {
        assert!(is_within_grid(1_048_575, 16_383));
        assert!(!is_within_grid(1_048_576, 0));
        assert!(!is_within_grid(0, 16_384));
        let (row, col) = reference_to_index("ZZZZZZZZZZZZ1").expect("letters fit in usize");
        assert!(!is_within_grid(row, col));
    }
}
