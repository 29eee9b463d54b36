//! Main menu keyboard layout

use crate::transport::ReplyKeyboard;

/// Lay out the main menu: node names in order, then the help button.
///
/// With no nodes the keyboard is removed, even though the help button would
/// still be available. Up to two nodes get one row per button. More than two
/// are packed two per row and the row count follows the nodes alone, so the
/// help button only shares the last row of an odd count and is left out
/// for an even one.
#[must_use]
pub fn main_menu_layout(node_names: &[String], help_label: &str) -> ReplyKeyboard {
    if node_names.is_empty() {
        return ReplyKeyboard::Remove;
    }

    let keys: Vec<String> = node_names
        .iter()
        .cloned()
        .chain(std::iter::once(help_label.to_string()))
        .collect();

    let rows = if node_names.len() > 2 {
        keys.chunks(2)
            .take(node_names.len().div_ceil(2))
            .map(<[String]>::to_vec)
            .collect()
    } else {
        keys.into_iter().map(|key| vec![key]).collect()
    };
    ReplyKeyboard::Rows(rows)
}
