//! Locale selection and the session's message catalogues.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static LOCALE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<lang>[A-Za-z]{2,8})(?:[-_](?P<region>[A-Za-z]{2}|[0-9]{3}))?(?:\.[^@]*)?(?:@.*)?$")
        .expect("locale tag pattern is valid")
});

/// A language with an optional region, e.g. `en` or `de-DE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    pub fn new(language: &str, region: Option<&str>) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            region: region.map(str::to_ascii_uppercase),
        }
    }

    pub fn english() -> Self {
        Self::new("en", None)
    }

    /// Parse BCP 47 style (`pt-BR`) and POSIX style (`pt_BR.UTF-8@euro`) tags.
    ///
    /// `C` and `POSIX` mean English.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if tag == "C" || tag == "POSIX" || tag.starts_with("C.") {
            return Some(Self::english());
        }
        let caps = LOCALE_TAG.captures(tag)?;
        Some(Self::new(
            &caps["lang"],
            caps.name("region").map(|m| m.as_str()),
        ))
    }

    /// The default locale of the running process.
    ///
    /// Looks at `LC_ALL`, `LC_MESSAGES` and `LANG`, first non-empty wins.
    pub fn process_default() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty())
            .and_then(|value| Self::parse(&value))
            .unwrap_or_else(Self::english)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn messages(&self) -> &'static Messages {
        match self.language.as_str() {
            "de" => &GERMAN,
            _ => &ENGLISH,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.language, region),
            None => f.write_str(&self.language),
        }
    }
}

/// User-facing feedback of the session. `{}` marks the single argument slot.
#[derive(Debug)]
pub struct Messages {
    pub welcome: &'static str,
    pub goodbye: &'static str,
    pub help: &'static str,
    pub unknown_command: &'static str,
    pub incomplete_input: &'static str,
    pub empty_pipeline_stage: &'static str,
    pub execution_failed: &'static str,
    pub script_not_found: &'static str,
    pub prompt_set: &'static str,
    pub prompt_retained: &'static str,
    pub history_empty: &'static str,
}

impl Messages {
    pub fn format(template: &str, arg: impl fmt::Display) -> String {
        template.replacen("{}", &arg.to_string(), 1)
    }
}

static ENGLISH: Messages = Messages {
    welcome: "|  Welcome to shell-launcher {}\n|  For an introduction type: /help\n",
    goodbye: "|  Goodbye\n",
    help: "\
|  Tool commands:
|    /help                       show this help
|    /history                    list the entries of this and earlier sessions
|    /set prompt P [C] [--retain]
|                                set the prompt and continuation prompt
|    /env                        list the session environment
|    /locale                     show the session locale
|    /exit [status]              end the session
|  Shell commands: pwd, cd, echo, cat, wc, printenv, exit and programs found in PATH.
|  Pipelines with |, quotes, $NAME and ${NAME} expansion and NAME=value assignments are supported.
",
    unknown_command: "|  Unknown command: {}\n",
    incomplete_input: "|  Incomplete input: {}\n",
    empty_pipeline_stage: "|  Missing command around '|'\n",
    execution_failed: "|  Execution failed: {}\n",
    script_not_found: "|  Could not read script {}\n",
    prompt_set: "|  Prompt changed\n",
    prompt_retained: "|  Prompt changed and retained\n",
    history_empty: "|  No history\n",
};

static GERMAN: Messages = Messages {
    welcome: "|  Willkommen bei shell-launcher {}\n|  Eine Einführung erhalten Sie mit: /help\n",
    goodbye: "|  Auf Wiedersehen\n",
    help: "\
|  Werkzeugbefehle:
|    /help                       diese Hilfe anzeigen
|    /history                    Einträge dieser und früherer Sitzungen auflisten
|    /set prompt P [C] [--retain]
|                                Eingabeaufforderung und Fortsetzungsaufforderung setzen
|    /env                        Umgebung der Sitzung auflisten
|    /locale                     Gebietsschema der Sitzung anzeigen
|    /exit [status]              Sitzung beenden
|  Shell-Befehle: pwd, cd, echo, cat, wc, printenv, exit und Programme aus PATH.
|  Unterstützt werden Pipelines mit |, Anführungszeichen, $NAME und ${NAME} sowie NAME=wert.
",
    unknown_command: "|  Unbekannter Befehl: {}\n",
    incomplete_input: "|  Unvollständige Eingabe: {}\n",
    empty_pipeline_stage: "|  Fehlender Befehl bei '|'\n",
    execution_failed: "|  Ausführung fehlgeschlagen: {}\n",
    script_not_found: "|  Skript {} konnte nicht gelesen werden\n",
    prompt_set: "|  Eingabeaufforderung geändert\n",
    prompt_retained: "|  Eingabeaufforderung geändert und gespeichert\n",
    history_empty: "|  Kein Verlauf\n",
};
