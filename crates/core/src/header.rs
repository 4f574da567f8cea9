//! Column headers and their semantic attributes.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Align {
    #[default]
    Default,
    Left,
    Center,
    Right,
}

/// Semantic attributes of a column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnAttrs {
    pub align: Align,
    /// Hidden in narrow layouts.
    pub wide: bool,
    /// Age/duration column: ignored when diffing, sorted as a duration.
    pub time: bool,
    /// Numeric magnitude such as "10 GiB".
    pub capacity: bool,
    /// Never shown.
    pub hide: bool,
}

impl ColumnAttrs {
    pub const WIDE: Self = Self { align: Align::Default, wide: true, time: false, capacity: false, hide: false };
    pub const TIME: Self = Self { align: Align::Default, wide: false, time: true, capacity: false, hide: false };
    pub const CAPACITY: Self = Self { align: Align::Right, wide: false, time: false, capacity: true, hide: false };
    pub const HIDE: Self = Self { align: Align::Default, wide: false, time: false, capacity: false, hide: true };

    /// Fill every unset attribute from `other`.
    pub fn merge(mut self, other: ColumnAttrs) -> ColumnAttrs {
        if self.align == Align::Default {
            self.align = other.align;
        }
        self.wide |= other.wide;
        self.time |= other.time;
        self.capacity |= other.capacity;
        self.hide |= other.hide;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderColumn {
    pub name: String,
    #[serde(default)]
    pub attrs: ColumnAttrs,
}

impl HeaderColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attrs: ColumnAttrs::default() }
    }

    pub fn with(name: impl Into<String>, attrs: ColumnAttrs) -> Self {
        Self { name: name.into(), attrs }
    }
}

/// Well-known column roles resolved once per header instead of by repeated name comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Age,
    State,
    Valid,
    Region,
}

impl ColumnRole {
    const ALL: [ColumnRole; 4] = [ColumnRole::Age, ColumnRole::State, ColumnRole::Valid, ColumnRole::Region];

    pub fn column_name(self) -> &'static str {
        match self {
            ColumnRole::Age => "AGE",
            ColumnRole::State => "STATE",
            ColumnRole::Valid => "VALID",
            ColumnRole::Region => "REGION",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Ordered column descriptors for one resource type's view.
///
/// Names are the stable cross-reference key; positions may change when a renderer
/// regenerates its header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    columns: Vec<HeaderColumn>,
    roles: [Option<usize>; 4],
}

impl Header {
    pub fn new(columns: Vec<HeaderColumn>) -> Self {
        let mut roles = [None; 4];
        for role in ColumnRole::ALL {
            roles[role.slot()] = columns.iter().position(|c| c.name == role.column_name());
        }
        Self { columns, roles }
    }

    pub fn len(&self) -> usize { self.columns.len() }
    pub fn is_empty(&self) -> bool { self.columns.is_empty() }
    pub fn columns(&self) -> &[HeaderColumn] { &self.columns }
    pub fn get(&self, col: usize) -> Option<&HeaderColumn> { self.columns.get(col) }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderColumn> {
        self.columns.iter()
    }

    /// Position of the column named `name`. Wide columns are skipped unless `include_wide`.
    pub fn index_of(&self, name: &str, include_wide: bool) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| (include_wide || !c.attrs.wide) && c.name == name)
    }

    /// Position of a well-known column, wide or not.
    pub fn role_index(&self, role: ColumnRole) -> Option<usize> {
        self.roles[role.slot()]
    }

    pub fn has_age(&self) -> bool {
        self.role_index(ColumnRole::Age).is_some()
    }

    /// Column treated as the age column when diffing rows: `AGE` if declared,
    /// otherwise the first time-attributed column.
    pub fn age_col(&self) -> Option<usize> {
        self.role_index(ColumnRole::Age)
            .or_else(|| self.columns.iter().position(|c| c.attrs.time))
    }

    pub fn is_time_col(&self, col: usize) -> bool {
        self.columns.get(col).map(|c| c.attrs.time).unwrap_or(false)
    }

    pub fn is_capacity_col(&self, col: usize) -> bool {
        self.columns.get(col).map(|c| c.attrs.capacity).unwrap_or(false)
    }

    pub fn column_names(&self, wide: bool) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| wide || !c.attrs.wide)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Indices of the columns shown in the given layout (hidden columns never are).
    pub fn visible_indices(&self, wide: bool) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.attrs.hide && (wide || !c.attrs.wide))
            .map(|(i, _)| i)
            .collect()
    }

    /// Header restricted to `cols`, in that order.
    pub fn customize(&self, cols: &[usize]) -> Header {
        Header::new(cols.iter().filter_map(|&i| self.columns.get(i).cloned()).collect())
    }

    pub fn diff(&self, other: &Header) -> bool {
        self.columns != other.columns
    }
}

impl From<Vec<HeaderColumn>> for Header {
    fn from(columns: Vec<HeaderColumn>) -> Self {
        Header::new(columns)
    }
}

impl FromIterator<HeaderColumn> for Header {
    fn from_iter<I: IntoIterator<Item = HeaderColumn>>(iter: I) -> Self {
        Header::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = &'a HeaderColumn;
    type IntoIter = std::slice::Iter<'a, HeaderColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
