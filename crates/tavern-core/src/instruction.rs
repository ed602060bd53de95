//! System instruction resolution
//!
//! The system instruction is a base string (configured or built-in) that an
//! optional persona either extends or replaces.

use crate::config::Settings;

/// Used whenever no base instruction is configured.
pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are an intelligent assistant that provides helpful responses to user queries.";

/// How a persona combines with the base instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonaMode {
    /// Persona follows the base instruction after a blank line
    #[default]
    Append,
    /// Persona replaces the base instruction
    Overwrite,
}

/// Anything that can produce the system instruction for a request.
pub trait SystemInstructionSource: Send + Sync {
    fn system_instruction(&self) -> String;
}

impl<F> SystemInstructionSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn system_instruction(&self) -> String {
        self()
    }
}

/// Combine base instruction and persona.
///
/// Both inputs are trimmed before use. A blank base falls back to
/// [`DEFAULT_SYSTEM_MESSAGE`]; a blank persona leaves the base untouched.
pub fn resolve_system_instruction(
    base: Option<&str>,
    persona: Option<&str>,
    mode: PersonaMode,
) -> String {
    let base = base
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_MESSAGE);

    let persona = match persona.map(str::trim).filter(|s| !s.is_empty()) {
        Some(persona) => persona,
        None => return base.to_string(),
    };

    match mode {
        PersonaMode::Overwrite => persona.to_string(),
        PersonaMode::Append => format!("{}\n\n{}", base, persona),
    }
}

/// Instruction source backed by a configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfiguredInstruction {
    pub base: Option<String>,
    pub persona: Option<String>,
    pub mode: PersonaMode,
}

impl ConfiguredInstruction {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base: settings.system_message.clone(),
            persona: settings.character_persona.clone(),
            mode: settings.persona_mode,
        }
    }
}

impl SystemInstructionSource for ConfiguredInstruction {
    fn system_instruction(&self) -> String {
        resolve_system_instruction(self.base.as_deref(), self.persona.as_deref(), self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_persona_returns_base() {
        let result = resolve_system_instruction(Some("Be brief."), None, PersonaMode::Append);
        assert_eq!(result, "Be brief.");
    }

    #[test]
    fn test_append_joins_with_blank_line() {
        let result = resolve_system_instruction(
            Some("Be brief."),
            Some("You are a ghost."),
            PersonaMode::Append,
        );
        assert_eq!(result, "Be brief.\n\nYou are a ghost.");
    }

    #[test]
    fn test_overwrite_replaces_base() {
        let result = resolve_system_instruction(
            Some("Be brief."),
            Some("You are a ghost."),
            PersonaMode::Overwrite,
        );
        assert_eq!(result, "You are a ghost.");
    }

    #[test]
    fn test_whitespace_persona_is_absent() {
        for mode in [PersonaMode::Append, PersonaMode::Overwrite] {
            let with_blank = resolve_system_instruction(Some("Base"), Some("   "), mode);
            let unset = resolve_system_instruction(Some("Base"), None, mode);
            assert_eq!(with_blank, unset);
            assert_eq!(with_blank, "Base");
        }
    }

    #[test]
    fn test_missing_base_uses_fallback() {
        assert_eq!(
            resolve_system_instruction(None, None, PersonaMode::Append),
            DEFAULT_SYSTEM_MESSAGE
        );
        assert_eq!(
            resolve_system_instruction(Some("  \n"), None, PersonaMode::Append),
            DEFAULT_SYSTEM_MESSAGE
        );
    }

    #[test]
    fn test_persona_is_trimmed() {
        let result = resolve_system_instruction(
            Some("Base"),
            Some("\n  A bard  \n"),
            PersonaMode::Append,
        );
        assert_eq!(result, "Base\n\nA bard");
    }

    #[test]
    fn test_configured_instruction_is_deterministic() {
        let source = ConfiguredInstruction {
            base: Some("Base".to_string()),
            persona: Some("Persona".to_string()),
            mode: PersonaMode::Append,
        };
        assert_eq!(source.system_instruction(), source.system_instruction());
        assert_eq!(source.system_instruction(), "Base\n\nPersona");
    }

    #[test]
    fn test_closure_is_a_source() {
        let source = || "fixed".to_string();
        assert_eq!(source.system_instruction(), "fixed");
    }
}
