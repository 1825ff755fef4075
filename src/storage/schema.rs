//! Snapshot bundle schema definitions

/// Current bundle format version; bumped on incompatible schema changes.
pub const FORMAT_VERSION: u32 = 1;

/// SQL to create the meta table (format version, snapshot version, checksum)
pub const CREATE_META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

/// SQL to create the verses table
pub const CREATE_VERSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS verses (
    reference TEXT PRIMARY KEY,
    text TEXT NOT NULL
)
"#;

/// SQL to create the notes table
pub const CREATE_NOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    slug TEXT PRIMARY KEY,
    range_start TEXT NOT NULL,
    range_end TEXT NOT NULL,
    text TEXT NOT NULL,
    edition TEXT
)
"#;

/// SQL to create the themes table
pub const CREATE_THEMES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS themes (
    slug TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    description TEXT
)
"#;

/// SQL to create the cross_refs table
pub const CREATE_CROSS_REFS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cross_refs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    kind TEXT NOT NULL,
    UNIQUE(source, target, kind)
)
"#;

/// SQL to create the theme_links table
pub const CREATE_THEME_LINKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS theme_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme TEXT NOT NULL,
    node TEXT NOT NULL,
    UNIQUE(theme, node)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_notes_range_start ON notes(range_start)",
    "CREATE INDEX IF NOT EXISTS idx_cross_refs_source ON cross_refs(source)",
    "CREATE INDEX IF NOT EXISTS idx_cross_refs_target ON cross_refs(target)",
    "CREATE INDEX IF NOT EXISTS idx_theme_links_theme ON theme_links(theme)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_META_TABLE,
        CREATE_VERSES_TABLE,
        CREATE_NOTES_TABLE,
        CREATE_THEMES_TABLE,
        CREATE_CROSS_REFS_TABLE,
        CREATE_THEME_LINKS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
