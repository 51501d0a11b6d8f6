//! Consolidated diagnostic codes and classification system
//!
//! Single source of truth for all error and success codes, their metadata,
//! and classification functions. Code constants live next to their
//! behavioral metadata so the two cannot drift apart.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for both error and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Critical" => Some(Severity::Critical),
            "High" => Some(Severity::High),
            "Medium" => Some(Severity::Medium),
            "Low" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// Complete metadata for a diagnostic code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const CONFIGURATION_ERROR: Code = Code::new("ERR003");
}

/// Tokenization error codes
pub mod lexical {
    use super::Code;

    pub const INVALID_CHARACTER: Code = Code::new("E020");
    pub const UNTERMINATED_STRING: Code = Code::new("E021");
    pub const INVALID_NUMBER: Code = Code::new("E022");
    pub const UNCLOSED_TAG: Code = Code::new("E023");
    pub const UNCLOSED_COMMENT: Code = Code::new("E024");

    // Resource-limit lexical error codes
    pub const SOURCE_TOO_LARGE: Code = Code::new("E025");
    pub const TOO_MANY_TOKENS: Code = Code::new("E026");
    pub const STRING_TOO_LARGE: Code = Code::new("E027");
}

/// Parsing error codes
pub mod syntax {
    use super::Code;

    pub const UNEXPECTED_TOKEN: Code = Code::new("E040");
    pub const UNCLOSED_BLOCK: Code = Code::new("E041");
    pub const DUPLICATE_ELSE: Code = Code::new("E042");
    pub const MAX_RECURSION_DEPTH: Code = Code::new("E043");
    pub const MALFORMED_EXPRESSION: Code = Code::new("E044");
    pub const MISSING_EOF: Code = Code::new("E045");
    pub const UNKNOWN_TAG: Code = Code::new("E046");
    pub const ELSEIF_AFTER_ELSE: Code = Code::new("E047");
}

/// Evaluation and rendering error codes
pub mod render {
    use super::Code;

    pub const DIVISION_BY_ZERO: Code = Code::new("E060");
    pub const UNKNOWN_FILTER: Code = Code::new("E061");
    pub const UNKNOWN_FUNCTION: Code = Code::new("E062");
    pub const UNKNOWN_TEST: Code = Code::new("E063");
    pub const SANDBOX_VIOLATION: Code = Code::new("E064");
    pub const INVALID_REGEX: Code = Code::new("E065");
    pub const INVALID_RANGE: Code = Code::new("E066");
    pub const TYPE_MISMATCH: Code = Code::new("E067");
    pub const MAX_INCLUDE_DEPTH: Code = Code::new("E068");
    pub const UNKNOWN_MACRO: Code = Code::new("E069");
    pub const TEMPLATE_NOT_FOUND: Code = Code::new("E070");
}

/// Attribute cache error codes
pub mod cache {
    use super::Code;

    pub const CACHE_POISONED: Code = Code::new("E080");
}

// ============================================================================
// SUCCESS CODE CONSTANTS
// ============================================================================

/// Success codes
pub mod success {
    use super::Code;

    // General success codes
    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I001");

    // Pipeline stage success codes
    pub const TOKENIZATION_COMPLETE: Code = Code::new("I020");
    pub const PARSE_COMPLETE: Code = Code::new("I040");
    pub const RENDER_COMPLETE: Code = Code::new("I060");

    // Cache maintenance success codes
    pub const CACHE_EVICTION_COMPLETE: Code = Code::new("I080");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

/// Error metadata registry using OnceLock for thread safety
static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

/// Initialize and get the error registry
fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        let mut registry = HashMap::new();

        // System errors
        registry.insert(
            "ERR001",
            ErrorMetadata::new(
                "ERR001",
                "System",
                Severity::Critical,
                false,
                true,
                "Critical internal engine error",
                "File a bug report with the failing template",
            ),
        );
        registry.insert(
            "ERR002",
            ErrorMetadata::new(
                "ERR002",
                "System",
                Severity::Critical,
                false,
                true,
                "Engine initialization failure",
                "Check configuration and environment variables",
            ),
        );
        registry.insert(
            "ERR003",
            ErrorMetadata::new(
                "ERR003",
                "System",
                Severity::High,
                false,
                true,
                "Invalid engine configuration",
                "Fix the configuration value named in the message",
            ),
        );

        // Tokenization errors
        registry.insert(
            "E020",
            ErrorMetadata::new(
                "E020",
                "Lexical",
                Severity::Medium,
                true,
                false,
                "Invalid character found inside a template tag",
                "Remove or escape the invalid character",
            ),
        );
        registry.insert(
            "E021",
            ErrorMetadata::new(
                "E021",
                "Lexical",
                Severity::Medium,
                true,
                false,
                "String literal not properly terminated",
                "Add the closing quote to the string literal",
            ),
        );
        registry.insert(
            "E022",
            ErrorMetadata::new(
                "E022",
                "Lexical",
                Severity::Low,
                true,
                false,
                "Number literal format is invalid",
                "Fix the number format (remove extra decimal points, etc.)",
            ),
        );
        registry.insert(
            "E023",
            ErrorMetadata::new(
                "E023",
                "Lexical",
                Severity::Medium,
                true,
                false,
                "Template tag opened but never closed",
                "Add the matching closing delimiter for the tag",
            ),
        );
        registry.insert(
            "E024",
            ErrorMetadata::new(
                "E024",
                "Lexical",
                Severity::Medium,
                true,
                false,
                "Comment tag opened but never closed",
                "Add the closing comment delimiter",
            ),
        );
        registry.insert(
            "E025",
            ErrorMetadata::new(
                "E025",
                "Lexical",
                Severity::High,
                false,
                true,
                "Template source exceeds maximum size limit",
                "Reduce template size or split it into includes",
            ),
        );
        registry.insert(
            "E026",
            ErrorMetadata::new(
                "E026",
                "Lexical",
                Severity::High,
                false,
                true,
                "Template produces too many tokens, possible DoS attack",
                "Reduce template complexity",
            ),
        );

        registry.insert(
            "E027",
            ErrorMetadata::new(
                "E027",
                "Lexical",
                Severity::Medium,
                true,
                false,
                "String literal exceeds maximum size limit",
                "Reduce string size or break it into smaller parts",
            ),
        );

        // Parsing errors
        registry.insert(
            "E040",
            ErrorMetadata::new(
                "E040",
                "Syntax",
                Severity::High,
                true,
                false,
                "Unexpected token during parsing",
                "Check tag syntax near the reported location",
            ),
        );
        registry.insert(
            "E041",
            ErrorMetadata::new(
                "E041",
                "Syntax",
                Severity::High,
                true,
                false,
                "Block tag without matching end tag",
                "Add the matching end tag (e.g., endif, endfor)",
            ),
        );
        registry.insert(
            "E042",
            ErrorMetadata::new(
                "E042",
                "Syntax",
                Severity::Medium,
                true,
                false,
                "Duplicate else branch in conditional block",
                "Remove the extra else branch",
            ),
        );
        registry.insert(
            "E043",
            ErrorMetadata::new(
                "E043",
                "Syntax",
                Severity::High,
                false,
                true,
                "Expression or block nesting exceeds maximum depth",
                "Flatten deeply nested expressions or blocks",
            ),
        );
        registry.insert(
            "E044",
            ErrorMetadata::new(
                "E044",
                "Syntax",
                Severity::Medium,
                true,
                false,
                "Expression could not be parsed",
                "Check operator usage and parenthesis balance",
            ),
        );
        registry.insert(
            "E045",
            ErrorMetadata::new(
                "E045",
                "Syntax",
                Severity::Medium,
                true,
                false,
                "Token stream ended without EOF marker",
                "Ensure the template was fully tokenized",
            ),
        );
        registry.insert(
            "E046",
            ErrorMetadata::new(
                "E046",
                "Syntax",
                Severity::Medium,
                true,
                false,
                "Unknown block tag name",
                "Check the tag name against the supported tag list",
            ),
        );

        registry.insert(
            "E047",
            ErrorMetadata::new(
                "E047",
                "Syntax",
                Severity::Medium,
                true,
                false,
                "Elseif branch found after the else branch",
                "Move the elseif branch before the else branch",
            ),
        );

        // Evaluation errors
        registry.insert(
            "E060",
            ErrorMetadata::new(
                "E060",
                "Render",
                Severity::Medium,
                true,
                false,
                "Division or modulo by zero during evaluation",
                "Guard the divisor with a conditional or default",
            ),
        );
        registry.insert(
            "E061",
            ErrorMetadata::new(
                "E061",
                "Render",
                Severity::Medium,
                true,
                false,
                "Filter name not registered in the environment",
                "Register the filter or fix the filter name",
            ),
        );
        registry.insert(
            "E062",
            ErrorMetadata::new(
                "E062",
                "Render",
                Severity::Medium,
                true,
                false,
                "Function name not registered in the environment",
                "Register the function or fix the function name",
            ),
        );
        registry.insert(
            "E063",
            ErrorMetadata::new(
                "E063",
                "Render",
                Severity::Medium,
                true,
                false,
                "Test name not registered in the environment",
                "Register the test or fix the test name",
            ),
        );
        registry.insert(
            "E064",
            ErrorMetadata::new(
                "E064",
                "Render",
                Severity::High,
                true,
                false,
                "Sandbox policy denied access to an attribute or method",
                "Adjust the sandbox policy or remove the access",
            ),
        );
        registry.insert(
            "E065",
            ErrorMetadata::new(
                "E065",
                "Render",
                Severity::Medium,
                true,
                false,
                "Pattern for matches operator failed to compile",
                "Fix the regular expression syntax",
            ),
        );
        registry.insert(
            "E066",
            ErrorMetadata::new(
                "E066",
                "Render",
                Severity::Medium,
                true,
                false,
                "Invalid arguments to range (zero step)",
                "Use a non-zero step argument",
            ),
        );
        registry.insert(
            "E067",
            ErrorMetadata::new(
                "E067",
                "Render",
                Severity::Medium,
                true,
                false,
                "Operation applied to incompatible value types",
                "Check operand types near the reported location",
            ),
        );
        registry.insert(
            "E068",
            ErrorMetadata::new(
                "E068",
                "Render",
                Severity::High,
                false,
                true,
                "Include nesting exceeds maximum depth",
                "Break the include cycle or flatten the hierarchy",
            ),
        );
        registry.insert(
            "E069",
            ErrorMetadata::new(
                "E069",
                "Render",
                Severity::Medium,
                true,
                false,
                "Macro name not defined in any visible scope",
                "Define the macro before calling it",
            ),
        );

        registry.insert(
            "E070",
            ErrorMetadata::new(
                "E070",
                "Render",
                Severity::Medium,
                true,
                false,
                "Included or extended template could not be loaded",
                "Check the template name and the configured loader",
            ),
        );

        // Cache errors
        registry.insert(
            "E080",
            ErrorMetadata::new(
                "E080",
                "Cache",
                Severity::High,
                true,
                false,
                "Attribute cache lock poisoned by a panicked thread",
                "Cache falls back to uncached resolution",
            ),
        );

        // Success codes
        registry.insert(
            "I001",
            ErrorMetadata::new(
                "I001",
                "System",
                Severity::Low,
                true,
                false,
                "Engine initialization completed successfully",
                "Continue to template processing",
            ),
        );
        registry.insert(
            "I020",
            ErrorMetadata::new(
                "I020",
                "Lexical",
                Severity::Low,
                true,
                false,
                "Tokenization completed successfully",
                "Continue to parsing",
            ),
        );
        registry.insert(
            "I040",
            ErrorMetadata::new(
                "I040",
                "Syntax",
                Severity::Low,
                true,
                false,
                "Parsing completed successfully",
                "Continue to rendering",
            ),
        );
        registry.insert(
            "I060",
            ErrorMetadata::new(
                "I060",
                "Render",
                Severity::Low,
                true,
                false,
                "Template rendered successfully",
                "Output is ready",
            ),
        );
        registry.insert(
            "I080",
            ErrorMetadata::new(
                "I080",
                "Cache",
                Severity::Low,
                true,
                false,
                "Attribute cache eviction completed",
                "Cache capacity restored",
            ),
        );

        registry
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

/// Get error metadata for a specific code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get error severity from code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if error is recoverable
pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

/// Check if error requires immediate halt
pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

/// Get human-readable description for code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get recommended action for code
pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

/// Get error category from code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(lexical::INVALID_CHARACTER.to_string(), "E020");
        assert_eq!(render::DIVISION_BY_ZERO.as_str(), "E060");
    }

    #[test]
    fn test_every_code_has_metadata() {
        let codes = [
            system::INTERNAL_ERROR,
            system::INITIALIZATION_FAILURE,
            system::CONFIGURATION_ERROR,
            lexical::INVALID_CHARACTER,
            lexical::UNTERMINATED_STRING,
            lexical::INVALID_NUMBER,
            lexical::UNCLOSED_TAG,
            lexical::UNCLOSED_COMMENT,
            lexical::SOURCE_TOO_LARGE,
            lexical::TOO_MANY_TOKENS,
            lexical::STRING_TOO_LARGE,
            syntax::UNEXPECTED_TOKEN,
            syntax::UNCLOSED_BLOCK,
            syntax::DUPLICATE_ELSE,
            syntax::MAX_RECURSION_DEPTH,
            syntax::MALFORMED_EXPRESSION,
            syntax::MISSING_EOF,
            syntax::UNKNOWN_TAG,
            syntax::ELSEIF_AFTER_ELSE,
            render::DIVISION_BY_ZERO,
            render::UNKNOWN_FILTER,
            render::UNKNOWN_FUNCTION,
            render::UNKNOWN_TEST,
            render::SANDBOX_VIOLATION,
            render::INVALID_REGEX,
            render::INVALID_RANGE,
            render::TYPE_MISMATCH,
            render::MAX_INCLUDE_DEPTH,
            render::UNKNOWN_MACRO,
            render::TEMPLATE_NOT_FOUND,
            cache::CACHE_POISONED,
            success::SYSTEM_INITIALIZATION_COMPLETED,
            success::TOKENIZATION_COMPLETE,
            success::PARSE_COMPLETE,
            success::RENDER_COMPLETE,
            success::CACHE_EVICTION_COMPLETE,
        ];

        for code in codes {
            assert_ne!(
                get_description(code.as_str()),
                "Unknown error",
                "missing metadata for {}",
                code
            );
        }
    }

    #[test]
    fn test_severity_classification() {
        assert_eq!(get_severity("ERR001"), Severity::Critical);
        assert_eq!(get_severity("E060"), Severity::Medium);
        assert_eq!(get_severity("E026"), Severity::High);
        // Unknown codes default to Medium
        assert_eq!(get_severity("E999"), Severity::Medium);
    }

    #[test]
    fn test_halt_classification() {
        assert!(requires_halt("ERR001"));
        assert!(requires_halt("E025"));
        assert!(!requires_halt("E060"));
        assert!(!requires_halt("E999"));
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(get_category("E020"), "Lexical");
        assert_eq!(get_category("E040"), "Syntax");
        assert_eq!(get_category("E060"), "Render");
        assert_eq!(get_category("E080"), "Cache");
    }

    #[test]
    fn test_severity_round_trip() {
        for severity in [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ] {
            assert_eq!(Severity::from_str(severity.as_str()), Some(severity));
        }
        assert_eq!(Severity::from_str("Bogus"), None);
    }
}
