use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Output palette, resolved once per process. Piped stdout gets the
/// unstyled default.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
}

impl Theme {
    fn colored() -> Self {
        Self {
            header: Style::new().blue().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow(),
            info: Style::new().cyan(),
            dim: Style::new().dimmed(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(|| {
        if console::Term::stdout().is_term() {
            Theme::colored()
        } else {
            Theme::default()
        }
    })
}
