// crates/stageline-cli/src/i18n.rs
// ============================================================================
// Module: CLI Internationalization Helpers
// Description: Provides message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings for future localization support.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The Stageline CLI stores user-facing strings in a small translation
//! catalog to enforce consistent messaging and to prepare for future locales.
//! All runtime output should be routed through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to English and then to the key itself.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported CLI locales.
///
/// # Invariants
/// - Variants are stable for CLI parsing and catalog lookup.
/// - [`Locale::En`] is the default fallback locale.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Locale {
    /// English (default).
    En,
    /// Spanish.
    Es,
}

impl Locale {
    /// Returns the canonical locale label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }

    /// Attempts to parse a locale value (case-insensitive, tolerant of region tags).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let normalized = value.to_ascii_lowercase();
        let lang = normalized.split(['-', '_']).next().unwrap_or("");
        match lang {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            _ => None,
        }
    }
}

/// Ordered list of supported CLI locales.
///
/// # Invariants
/// - Ordering is stable for deterministic presentation.
pub const SUPPORTED_LOCALES: &[Locale] = &[Locale::En, Locale::Es];

/// A formatted message argument captured by the [`macro@crate::t`] macro.
///
/// # Invariants
/// - `key` matches a placeholder name without braces (for example, `path`).
/// - `value` is preformatted and should be safe for display.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Locale Selection
// ============================================================================

/// Global locale selection for CLI output.
static CURRENT_LOCALE: OnceLock<Locale> = OnceLock::new();

/// Sets the CLI locale. Only the first call wins.
pub fn set_locale(locale: Locale) {
    let _ = CURRENT_LOCALE.set(locale);
}

/// Returns the current CLI locale (defaults to English).
#[must_use]
pub fn current_locale() -> Locale {
    CURRENT_LOCALE.get().copied().unwrap_or(Locale::En)
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static English catalog entries loaded into the localized message bundle.
const CATALOG_EN: &[(&str, &str)] = &[
    ("main.version", "stageline {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.json_failed", "Failed to render JSON output: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config valid."),
    ("store.backend.unsupported", "store type must be sqlite for this command."),
    ("store.open_failed", "Failed to open sqlite store: {error}"),
    ("part.invalid", "Invalid part name {part}: {error}"),
    ("procedure.kind.input", "procedure configuration"),
    ("procedure.read_failed", "Failed to read procedure file at {path}: {error}"),
    ("procedure.parse_failed", "Failed to parse procedure JSON at {path}: {error}"),
    ("procedure.synthesis_failed", "Failed to synthesize schema: {error}"),
    (
        "procedure.validate.ok",
        "Procedure valid: {stages} enabled stage(s), {fields} schema field(s).",
    ),
    ("procedure.apply.failed", "Failed to apply procedure for {part}: {error}"),
    ("procedure.apply.header", "Procedure apply result:"),
    (
        "procedure.apply.summary",
        "- part={part} storage={storage} created={created} changed={changed} \
         columns_added={columns}",
    ),
    ("sync.failed", "Re-sync failed: {error}"),
    ("sync.header", "Re-sync results:"),
    ("sync.none", "No registered parts to sync."),
    ("sync.entry", "- {part}: created={created} changed={changed} columns_added={columns}"),
    ("sync.entry.failed", "- {part}: failed: {error}"),
    ("sync.cancelled", "Re-sync cancelled before completion."),
    ("report.columns.none", "none"),
    ("registry.list.failed", "Failed to list registered parts: {error}"),
    ("registry.list.header", "Registered parts:"),
    ("registry.list.none", "No parts registered."),
    ("registry.list.entry", "- {part} storage={storage} fields={fields} hash={hash}"),
    ("registry.list.more", "More parts available after cursor {token}."),
    ("registry.show.failed", "Failed to look up part: {error}"),
    ("registry.show.not_found", "Part not registered: {part}"),
    ("entry.kind.values", "entry values"),
    ("entry.kind.filter", "entry filter"),
    ("entry.input.read_failed", "Failed to read {kind} at {path}: {error}"),
    ("entry.input.parse_failed", "Failed to parse {kind} at {path}: {error}"),
    ("entry.create.failed", "Failed to create entry for {part}: {error}"),
    ("entry.query.failed", "Failed to query entries for {part}: {error}"),
    ("entry.query.header", "Entries:"),
    ("entry.query.none", "No entries matched."),
    ("entry.query.entry", "- id={id} created_at={created_at} updated_at={updated_at} {values}"),
    ("i18n.lang.invalid_env", "Invalid value for {env}: {value}. Expected 'en' or 'es'."),
    (
        "i18n.disclaimer.machine_translated",
        "Note: non-English output is machine-translated and may be inaccurate.",
    ),
];

/// Static Spanish catalog entries loaded into the localized message bundle.
const CATALOG_ES: &[(&str, &str)] = &[
    ("main.version", "stageline {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "salida"),
    ("output.write_failed", "No se pudo escribir en {stream}: {error}"),
    ("output.json_failed", "No se pudo generar la salida JSON: {error}"),
    (
        "input.read_too_large",
        "Se rechaza la lectura de {kind} en {path} porque ocupa {size} bytes (límite {limit}).",
    ),
    ("config.load_failed", "No se pudo cargar la configuración: {error}"),
    ("config.validate.ok", "Configuración válida."),
    ("store.backend.unsupported", "El tipo de store debe ser sqlite para este comando."),
    ("store.open_failed", "No se pudo abrir la base de datos sqlite: {error}"),
    ("part.invalid", "Nombre de pieza no válido {part}: {error}"),
    ("procedure.kind.input", "configuración de procedimiento"),
    (
        "procedure.read_failed",
        "No se pudo leer el archivo de procedimiento en {path}: {error}",
    ),
    (
        "procedure.parse_failed",
        "No se pudo analizar el JSON del procedimiento en {path}: {error}",
    ),
    ("procedure.synthesis_failed", "No se pudo sintetizar el esquema: {error}"),
    (
        "procedure.validate.ok",
        "Procedimiento válido: {stages} etapa(s) habilitada(s), {fields} campo(s) de esquema.",
    ),
    ("procedure.apply.failed", "No se pudo aplicar el procedimiento para {part}: {error}"),
    ("procedure.apply.header", "Resultado de la aplicación del procedimiento:"),
    (
        "procedure.apply.summary",
        "- part={part} storage={storage} created={created} changed={changed} \
         columns_added={columns}",
    ),
    ("sync.failed", "La resincronización ha fallado: {error}"),
    ("sync.header", "Resultados de la resincronización:"),
    ("sync.none", "No hay piezas registradas para sincronizar."),
    ("sync.entry", "- {part}: created={created} changed={changed} columns_added={columns}"),
    ("sync.entry.failed", "- {part}: fallo: {error}"),
    ("sync.cancelled", "Resincronización cancelada antes de completarse."),
    ("report.columns.none", "ninguna"),
    ("registry.list.failed", "No se pudieron listar las piezas registradas: {error}"),
    ("registry.list.header", "Piezas registradas:"),
    ("registry.list.none", "No hay piezas registradas."),
    ("registry.list.entry", "- {part} storage={storage} fields={fields} hash={hash}"),
    ("registry.list.more", "Hay más piezas disponibles después del cursor {token}."),
    ("registry.show.failed", "No se pudo consultar la pieza: {error}"),
    ("registry.show.not_found", "Pieza no registrada: {part}"),
    ("entry.kind.values", "valores de la entrada"),
    ("entry.kind.filter", "filtro de entradas"),
    ("entry.input.read_failed", "No se pudo leer {kind} en {path}: {error}"),
    ("entry.input.parse_failed", "No se pudo analizar {kind} en {path}: {error}"),
    ("entry.create.failed", "No se pudo crear la entrada para {part}: {error}"),
    ("entry.query.failed", "No se pudieron consultar las entradas para {part}: {error}"),
    ("entry.query.header", "Entradas:"),
    ("entry.query.none", "Ninguna entrada coincide."),
    ("entry.query.entry", "- id={id} created_at={created_at} updated_at={updated_at} {values}"),
    ("i18n.lang.invalid_env", "Valor no válido para {env}: {value}. Se esperaba 'en' o 'es'."),
    (
        "i18n.disclaimer.machine_translated",
        "Nota: la salida que no está en inglés se traduce automáticamente y puede ser inexacta.",
    ),
];

/// Returns the message catalog for the requested locale.
pub(crate) fn catalog_for(locale: Locale) -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_EN_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    static CATALOG_ES_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    match locale {
        Locale::En => CATALOG_EN_MAP.get_or_init(|| CATALOG_EN.iter().copied().collect()),
        Locale::Es => CATALOG_ES_MAP.get_or_init(|| CATALOG_ES.iter().copied().collect()),
    }
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the selected locale while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let locale = current_locale();
    let template = catalog_for(locale)
        .get(key)
        .copied()
        .or_else(|| catalog_for(Locale::En).get(key).copied())
        .unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a localized message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
///
/// # Returns
///
/// A localized [`String`] with placeholders substituted.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

// ============================================================================
// SECTION: Tests
// ============================================================================
