use super::PropertyKind;
use indexmap::IndexMap;

/// Column type of a destination table.
pub type ColumnType = PropertyKind;

/// The destination table's columns, in the order Notion lists them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationSchema {
    columns: IndexMap<String, ColumnType>,
}

impl DestinationSchema {
    pub fn new(columns: IndexMap<String, ColumnType>) -> Self {
        Self { columns }
    }

    pub fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The table's title column; every Notion database has exactly one.
    pub fn title_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, kind)| **kind == ColumnType::Title)
            .map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnType)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, ColumnType)> for DestinationSchema {
    fn from_iter<I: IntoIterator<Item = (String, ColumnType)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
