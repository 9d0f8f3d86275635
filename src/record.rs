use serde::{Deserialize, Serialize};

/// A mergeable bibliographic field.
///
/// `isbn` is deliberately absent: it is the lookup key and is set once when
/// the record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Author,
    Publisher,
    PubDate,
    Pages,
    Price,
    Summary,
    Cover,
}

impl Field {
    /// All mergeable fields, in display order.
    pub const ALL: [Field; 8] = [
        Field::Title,
        Field::Author,
        Field::Publisher,
        Field::PubDate,
        Field::Pages,
        Field::Price,
        Field::Summary,
        Field::Cover,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Publisher => "publisher",
            Field::PubDate => "pub_date",
            Field::Pages => "pages",
            Field::Price => "price",
            Field::Summary => "summary",
            Field::Cover => "cover",
        }
    }
}

/// One provider's contribution to a lookup.
///
/// `None` means the provider does not carry the field at all; `Some("")`
/// means it carries the field but has no value for this book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub pub_date: Option<String>,
    pub pages: Option<String>,
    pub price: Option<String>,
    pub summary: Option<String>,
    pub cover: Option<String>,
}

impl PartialRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::Publisher => &self.publisher,
            Field::PubDate => &self.pub_date,
            Field::Pages => &self.pages,
            Field::Price => &self.price,
            Field::Summary => &self.summary,
            Field::Cover => &self.cover,
        };
        value.as_deref()
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Publisher => &mut self.publisher,
            Field::PubDate => &mut self.pub_date,
            Field::Pages => &mut self.pages,
            Field::Price => &mut self.price,
            Field::Summary => &mut self.summary,
            Field::Cover => &mut self.cover,
        };
        *slot = Some(value.into());
    }

    /// Present fields as `(field, value)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|v| (f, v)))
    }

    /// True when the provider supplied a non-empty title or author.
    pub fn has_identity(&self) -> bool {
        [Field::Title, Field::Author]
            .into_iter()
            .any(|f| self.get(f).is_some_and(|v| !v.trim().is_empty()))
    }
}

/// The merged result of one ISBN lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub pub_date: String,
    pub pages: String,
    pub price: String,
    pub summary: String,
    pub cover: String,
}

impl CanonicalRecord {
    /// An empty record keyed by `isbn`.
    pub fn new(isbn: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::Publisher => &self.publisher,
            Field::PubDate => &self.pub_date,
            Field::Pages => &self.pages,
            Field::Price => &self.price,
            Field::Summary => &self.summary,
            Field::Cover => &self.cover,
        }
    }

    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Publisher => &mut self.publisher,
            Field::PubDate => &mut self.pub_date,
            Field::Pages => &mut self.pages,
            Field::Price => &mut self.price,
            Field::Summary => &mut self.summary,
            Field::Cover => &mut self.cover,
        }
    }

    /// Set `field` only if it is still blank. Returns whether the value was taken.
    pub fn fill(&mut self, field: Field, value: &str) -> bool {
        let slot = self.slot(field);
        if !slot.trim().is_empty() || value.trim().is_empty() {
            return false;
        }
        *slot = value.trim().to_string();
        true
    }

    /// Fold a lower-priority contribution into this record, first writer wins.
    ///
    /// Returns the fields this contribution actually filled.
    pub fn merge(&mut self, partial: &PartialRecord) -> Vec<Field> {
        partial
            .fields()
            .filter_map(|(field, value)| self.fill(field, value).then_some(field))
            .collect()
    }

    /// Replace the cover unconditionally. Only the cover processor does this.
    pub fn set_cover(&mut self, url: String) {
        self.cover = url;
    }

    /// The minimum bar for a found book: a title or an author.
    pub fn is_found(&self) -> bool {
        !self.title.is_empty() || !self.author.is_empty()
    }

    /// Fields that are still blank after merging.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_empty())
            .map(|f| f.name())
            .collect()
    }
}

/// Keep ASCII digits only. Used to normalize dates, prices, and page counts.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}
