//! Canonical references - stable identity for every verse
//!
//! A verse is identified by its (book, chapter, verse) triple. Two textual
//! forms are accepted everywhere a reference is parsed:
//!
//! - Compact: `GEN.15.6`
//! - Human: `Genesis 15:6`
//!
//! Ordering is total: canonical book order, then chapter, then verse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

struct BookInfo {
    abbrev: &'static str,
    name: &'static str,
    chapters: u16,
}

/// The 66 canonical books in order, with three-letter abbreviations and
/// chapter counts.
static BOOKS: [BookInfo; 66] = [
    BookInfo { abbrev: "GEN", name: "Genesis", chapters: 50 },
    BookInfo { abbrev: "EXO", name: "Exodus", chapters: 40 },
    BookInfo { abbrev: "LEV", name: "Leviticus", chapters: 27 },
    BookInfo { abbrev: "NUM", name: "Numbers", chapters: 36 },
    BookInfo { abbrev: "DEU", name: "Deuteronomy", chapters: 34 },
    BookInfo { abbrev: "JOS", name: "Joshua", chapters: 24 },
    BookInfo { abbrev: "JDG", name: "Judges", chapters: 21 },
    BookInfo { abbrev: "RUT", name: "Ruth", chapters: 4 },
    BookInfo { abbrev: "1SA", name: "1 Samuel", chapters: 31 },
    BookInfo { abbrev: "2SA", name: "2 Samuel", chapters: 24 },
    BookInfo { abbrev: "1KI", name: "1 Kings", chapters: 22 },
    BookInfo { abbrev: "2KI", name: "2 Kings", chapters: 25 },
    BookInfo { abbrev: "1CH", name: "1 Chronicles", chapters: 29 },
    BookInfo { abbrev: "2CH", name: "2 Chronicles", chapters: 36 },
    BookInfo { abbrev: "EZR", name: "Ezra", chapters: 10 },
    BookInfo { abbrev: "NEH", name: "Nehemiah", chapters: 13 },
    BookInfo { abbrev: "EST", name: "Esther", chapters: 10 },
    BookInfo { abbrev: "JOB", name: "Job", chapters: 42 },
    BookInfo { abbrev: "PSA", name: "Psalms", chapters: 150 },
    BookInfo { abbrev: "PRO", name: "Proverbs", chapters: 31 },
    BookInfo { abbrev: "ECC", name: "Ecclesiastes", chapters: 12 },
    BookInfo { abbrev: "SON", name: "Song of Solomon", chapters: 8 },
    BookInfo { abbrev: "ISA", name: "Isaiah", chapters: 66 },
    BookInfo { abbrev: "JER", name: "Jeremiah", chapters: 52 },
    BookInfo { abbrev: "LAM", name: "Lamentations", chapters: 5 },
    BookInfo { abbrev: "EZE", name: "Ezekiel", chapters: 48 },
    BookInfo { abbrev: "DAN", name: "Daniel", chapters: 12 },
    BookInfo { abbrev: "HOS", name: "Hosea", chapters: 14 },
    BookInfo { abbrev: "JOE", name: "Joel", chapters: 3 },
    BookInfo { abbrev: "AMO", name: "Amos", chapters: 9 },
    BookInfo { abbrev: "OBA", name: "Obadiah", chapters: 1 },
    BookInfo { abbrev: "JON", name: "Jonah", chapters: 4 },
    BookInfo { abbrev: "MIC", name: "Micah", chapters: 7 },
    BookInfo { abbrev: "NAH", name: "Nahum", chapters: 3 },
    BookInfo { abbrev: "HAB", name: "Habakkuk", chapters: 3 },
    BookInfo { abbrev: "ZEP", name: "Zephaniah", chapters: 3 },
    BookInfo { abbrev: "HAG", name: "Haggai", chapters: 2 },
    BookInfo { abbrev: "ZEC", name: "Zechariah", chapters: 14 },
    BookInfo { abbrev: "MAL", name: "Malachi", chapters: 4 },
    BookInfo { abbrev: "MAT", name: "Matthew", chapters: 28 },
    BookInfo { abbrev: "MAR", name: "Mark", chapters: 16 },
    BookInfo { abbrev: "LUK", name: "Luke", chapters: 24 },
    BookInfo { abbrev: "JOH", name: "John", chapters: 21 },
    BookInfo { abbrev: "ACT", name: "Acts", chapters: 28 },
    BookInfo { abbrev: "ROM", name: "Romans", chapters: 16 },
    BookInfo { abbrev: "1CO", name: "1 Corinthians", chapters: 16 },
    BookInfo { abbrev: "2CO", name: "2 Corinthians", chapters: 13 },
    BookInfo { abbrev: "GAL", name: "Galatians", chapters: 6 },
    BookInfo { abbrev: "EPH", name: "Ephesians", chapters: 6 },
    BookInfo { abbrev: "PHI", name: "Philippians", chapters: 4 },
    BookInfo { abbrev: "COL", name: "Colossians", chapters: 4 },
    BookInfo { abbrev: "1TH", name: "1 Thessalonians", chapters: 5 },
    BookInfo { abbrev: "2TH", name: "2 Thessalonians", chapters: 3 },
    BookInfo { abbrev: "1TI", name: "1 Timothy", chapters: 6 },
    BookInfo { abbrev: "2TI", name: "2 Timothy", chapters: 4 },
    BookInfo { abbrev: "TIT", name: "Titus", chapters: 3 },
    BookInfo { abbrev: "PHM", name: "Philemon", chapters: 1 },
    BookInfo { abbrev: "HEB", name: "Hebrews", chapters: 13 },
    BookInfo { abbrev: "JAM", name: "James", chapters: 5 },
    BookInfo { abbrev: "1PE", name: "1 Peter", chapters: 5 },
    BookInfo { abbrev: "2PE", name: "2 Peter", chapters: 3 },
    BookInfo { abbrev: "1JO", name: "1 John", chapters: 5 },
    BookInfo { abbrev: "2JO", name: "2 John", chapters: 1 },
    BookInfo { abbrev: "3JO", name: "3 John", chapters: 1 },
    BookInfo { abbrev: "JUD", name: "Jude", chapters: 1 },
    BookInfo { abbrev: "REV", name: "Revelation", chapters: 22 },
];

/// Common alternate names accepted on input.
static ALIASES: [(&str, &str); 5] = [
    ("psalm", "PSA"),
    ("song of songs", "SON"),
    ("canticles", "SON"),
    ("revelations", "REV"),
    ("apocalypse", "REV"),
];

/// A canonical book, ordered by its position in the canon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Book(u8);

impl Book {
    /// Number of books in the canon
    pub const COUNT: usize = 66;

    /// Get a book by canonical ordinal (0 = Genesis, 65 = Revelation)
    pub fn from_ordinal(ordinal: u8) -> Option<Book> {
        ((ordinal as usize) < Self::COUNT).then_some(Book(ordinal))
    }

    /// Canonical ordinal of this book
    pub fn ordinal(self) -> u8 {
        self.0
    }

    /// Three-letter uppercase abbreviation
    pub fn abbrev(self) -> &'static str {
        BOOKS[self.0 as usize].abbrev
    }

    /// Full display name
    pub fn name(self) -> &'static str {
        BOOKS[self.0 as usize].name
    }

    /// Number of chapters in this book
    pub fn chapters(self) -> u16 {
        BOOKS[self.0 as usize].chapters
    }

    /// Iterate over all books in canonical order
    pub fn all() -> impl Iterator<Item = Book> {
        (0..Self::COUNT as u8).map(Book)
    }

    /// Look up a book by abbreviation, full name, or alias (case-insensitive)
    pub fn lookup(s: &str) -> Option<Book> {
        let needle = s.trim().to_lowercase();
        if let Some(pos) = BOOKS
            .iter()
            .position(|b| b.abbrev.eq_ignore_ascii_case(&needle) || b.name.to_lowercase() == needle)
        {
            return Some(Book(pos as u8));
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == needle)
            .and_then(|(_, abbrev)| Book::lookup(abbrev))
    }
}

impl FromStr for Book {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Book::lookup(s).ok_or_else(|| Error::InvalidReference(format!("Unknown book: {}", s)))
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Global, stable identity for a verse.
///
/// This is the primary key for scripture nodes, reference-index entries,
/// and the canonical sort order used throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VerseId {
    pub book: Book,
    pub chapter: u16,
    pub verse: u16,
}

impl VerseId {
    pub fn new(book: Book, chapter: u16, verse: u16) -> Self {
        Self { book, chapter, verse }
    }

    /// Compact form: `GEN.15.6`
    pub fn compact(&self) -> String {
        format!("{}.{}.{}", self.book.abbrev(), self.chapter, self.verse)
    }

    /// Parse either the compact or the human form.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let err = || Error::InvalidReference(format!("Cannot parse verse reference: {}", s));

        if let Some((book_str, rest)) = split_compact(s) {
            let (chapter, verse) = rest.split_once('.').ok_or_else(err)?;
            return Ok(Self {
                book: book_str.parse()?,
                chapter: chapter.parse().map_err(|_| err())?,
                verse: verse.parse().map_err(|_| err())?,
            });
        }

        // Human form: book name (may contain spaces) followed by chapter:verse
        let (book_str, chap_verse) = s.rsplit_once(' ').ok_or_else(err)?;
        let (chapter, verse) = chap_verse.split_once(':').ok_or_else(err)?;
        Ok(Self {
            book: book_str.parse()?,
            chapter: chapter.parse().map_err(|_| err())?,
            verse: verse.parse().map_err(|_| err())?,
        })
    }
}

/// Split `ABC.rest` when the head looks like a compact book abbreviation.
fn split_compact(s: &str) -> Option<(&str, &str)> {
    let (head, rest) = s.split_once('.')?;
    (head.len() == 3 && !rest.contains(':')).then_some((head, rest))
}

impl FromStr for VerseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VerseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book.name(), self.chapter, self.verse)
    }
}

impl Serialize for VerseId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.compact())
    }
}

impl<'de> Deserialize<'de> for VerseId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        VerseId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An inclusive verse range within a single book, used by notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VerseRange {
    pub start: VerseId,
    pub end: VerseId,
}

impl VerseRange {
    /// Create a range, enforcing same book and start <= end.
    pub fn new(start: VerseId, end: VerseId) -> Result<Self> {
        if start.book != end.book {
            return Err(Error::InvalidReference(format!(
                "Range crosses books: {} .. {}",
                start, end
            )));
        }
        if start > end {
            return Err(Error::InvalidReference(format!(
                "Range start after end: {} .. {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A single-verse range.
    pub fn single(verse: VerseId) -> Self {
        Self { start: verse, end: verse }
    }

    pub fn contains(&self, verse: VerseId) -> bool {
        self.start <= verse && verse <= self.end
    }

    /// Check for any overlap with another range.
    pub fn overlaps(&self, other: &VerseRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Parse `GEN.15.1-6`, `Genesis 15:1-6`, `GEN.15.1-16.2`,
    /// `Genesis 15:1-16:2`, or a bare verse reference.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((head, tail)) = s.rsplit_once('-') else {
            return Ok(Self::single(VerseId::parse(s)?));
        };

        let start = VerseId::parse(head)?;
        let end = if let Some((chapter, verse)) = tail.split_once([':', '.']) {
            VerseId::new(
                start.book,
                chapter
                    .parse()
                    .map_err(|_| Error::InvalidReference(format!("Bad range end: {}", s)))?,
                verse
                    .parse()
                    .map_err(|_| Error::InvalidReference(format!("Bad range end: {}", s)))?,
            )
        } else {
            VerseId::new(
                start.book,
                start.chapter,
                tail.parse()
                    .map_err(|_| Error::InvalidReference(format!("Bad range end: {}", s)))?,
            )
        };

        Self::new(start, end)
    }

    /// Compact form: `GEN.15.1-6` (single-verse ranges render as the verse)
    pub fn compact(&self) -> String {
        if self.start == self.end {
            self.start.compact()
        } else if self.start.chapter == self.end.chapter {
            format!("{}-{}", self.start.compact(), self.end.verse)
        } else {
            format!("{}-{}.{}", self.start.compact(), self.end.chapter, self.end.verse)
        }
    }
}

impl FromStr for VerseRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else if self.start.chapter == self.end.chapter {
            write!(f, "{}-{}", self.start, self.end.verse)
        } else {
            write!(f, "{}-{}:{}", self.start, self.end.chapter, self.end.verse)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_lookup() {
        assert_eq!(Book::lookup("GEN").unwrap().name(), "Genesis");
        assert_eq!(Book::lookup("genesis").unwrap().abbrev(), "GEN");
        assert_eq!(Book::lookup("1 Samuel").unwrap().abbrev(), "1SA");
        assert_eq!(Book::lookup("Psalm").unwrap().abbrev(), "PSA");
        assert_eq!(Book::lookup("Revelations").unwrap().abbrev(), "REV");
        assert!(Book::lookup("Enoch").is_none());
    }

    #[test]
    fn test_book_order() {
        let genesis = Book::lookup("GEN").unwrap();
        let rev = Book::lookup("REV").unwrap();
        assert!(genesis < rev);
        assert_eq!(Book::all().count(), 66);
    }

    #[test]
    fn test_verse_parse_compact() {
        let v = VerseId::parse("GEN.15.6").unwrap();
        assert_eq!(v.book.abbrev(), "GEN");
        assert_eq!(v.chapter, 15);
        assert_eq!(v.verse, 6);
        assert_eq!(v.compact(), "GEN.15.6");
    }

    #[test]
    fn test_verse_parse_human() {
        let v = VerseId::parse("Genesis 15:6").unwrap();
        assert_eq!(v.compact(), "GEN.15.6");
        assert_eq!(v.to_string(), "Genesis 15:6");

        let v = VerseId::parse("1 Samuel 3:4").unwrap();
        assert_eq!(v.compact(), "1SA.3.4");
    }

    #[test]
    fn test_verse_ordering() {
        let a = VerseId::parse("GEN.15.6").unwrap();
        let b = VerseId::parse("GEN.15.7").unwrap();
        let c = VerseId::parse("ROM.4.3").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_invalid_references() {
        assert!(VerseId::parse("Genesis").is_err());
        assert!(VerseId::parse("GEN.x.1").is_err());
        assert!(VerseId::parse("Enoch 1:1").is_err());
    }

    #[test]
    fn test_range_parse() {
        let r = VerseRange::parse("GEN.15.1-6").unwrap();
        assert_eq!(r.start.compact(), "GEN.15.1");
        assert_eq!(r.end.compact(), "GEN.15.6");
        assert!(r.contains(VerseId::parse("GEN.15.3").unwrap()));
        assert!(!r.contains(VerseId::parse("GEN.16.1").unwrap()));

        let r = VerseRange::parse("Genesis 15:1-16:2").unwrap();
        assert_eq!(r.end.compact(), "GEN.16.2");

        let single = VerseRange::parse("ROM.4.3").unwrap();
        assert_eq!(single.start, single.end);
    }

    #[test]
    fn test_range_rejects_inverted() {
        assert!(VerseRange::parse("GEN.15.6-1").is_err());
    }

    #[test]
    fn test_range_compact_roundtrip() {
        for s in ["GEN.15.1-6", "GEN.15.1-16.2", "ROM.4.3"] {
            let r = VerseRange::parse(s).unwrap();
            assert_eq!(VerseRange::parse(&r.compact()).unwrap(), r);
        }
    }
}
