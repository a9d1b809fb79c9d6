//! Property-based tests for rust_sink_logger using proptest

use proptest::prelude::*;
use rust_sink_logger::core::{parse_label, render_line};
use rust_sink_logger::prelude::*;
use rust_sink_logger::sinks::{parse_size, Retention};

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Silly),
        Just(LogLevel::Debug),
        Just(LogLevel::Verbose),
        Just(LogLevel::Http),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

/// Label values never contain the delimiters
fn label_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,24}"
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// Test that LogLevel ordering matches the numeric severity
    #[test]
    fn test_log_level_ordering(level1 in any_level(), level2 in any_level()) {
        let val1 = level1 as u8;
        let val2 = level2 as u8;

        prop_assert_eq!(level1 <= level2, val1 <= val2);
        prop_assert_eq!(level1 < level2, val1 < val2);
        prop_assert_eq!(level1 >= level2, val1 >= val2);
    }

    /// Test that parsing accepts any casing
    #[test]
    fn test_log_level_case_insensitive(level in any_level(), upper in any::<bool>()) {
        let input = if upper {
            level.to_str().to_uppercase()
        } else {
            level.to_str().to_string()
        };
        prop_assert_eq!(input.parse::<LogLevel>().unwrap(), level);
    }

    /// Test that the logger filter agrees with level ordering
    #[test]
    fn test_logger_filter_matches_ordering(min in any_level(), level in any_level()) {
        let logger = Logger::builder()
            .min_level(min)
            .sink(SinkDescriptor::stream(SharedBuffer::new()))
            .build()
            .unwrap();
        prop_assert_eq!(logger.is_enabled(level), level >= min);
    }
}

// ============================================================================
// Label Tests
// ============================================================================

proptest! {
    /// Test that every identity field survives render and parse
    #[test]
    fn test_identity_label_roundtrip(
        service_name in label_value(),
        service_id in label_value(),
        module in label_value(),
        component in label_value(),
        pid in proptest::option::of(any::<u32>()),
    ) {
        let mut identity = ServiceIdentity::new(service_name.clone(), service_id.clone())
            .with_module(module.clone())
            .with_component(component.clone());
        if let Some(pid) = pid {
            identity = identity.with_process_id(pid);
        }

        let fields = parse_label(&identity.label());
        prop_assert_eq!(fields.service_name(), Some(service_name.as_str()));
        prop_assert_eq!(fields.service_id(), Some(service_id.as_str()));
        prop_assert_eq!(fields.module(), Some(module.as_str()));
        prop_assert_eq!(fields.component(), Some(component.as_str()));
        prop_assert_eq!(fields.process_id().map(str::to_string), pid.map(|p| p.to_string()));
    }

    /// Test that parsing arbitrary text never panics
    #[test]
    fn test_parse_label_total(label in ".*") {
        let fields = parse_label(&label);
        prop_assert!(fields.entries().len() <= label.split('|').count());
    }
}

// ============================================================================
// Record Tests
// ============================================================================

proptest! {
    /// Test that the text line keeps its four pipe-delimited fields
    #[test]
    fn test_render_line_shape(
        level in any_level(),
        label in label_value(),
        message in "[^|\n]{0,64}",
    ) {
        let record = LogRecord::new(level, message.clone(), label.clone());
        let line = render_line(&record, false);
        let parts: Vec<&str> = line.split(" | ").collect();

        prop_assert_eq!(parts.len(), 4);
        prop_assert_eq!(parts[0], label.as_str());
        prop_assert_eq!(parts[1], level.to_str());
        prop_assert_eq!(parts[3], message.as_str());
    }

    /// Test that JSON records keep their fields through serde
    #[test]
    fn test_record_json_fields(
        level in any_level(),
        message in ".{0,64}",
        child in proptest::option::of(label_value()),
    ) {
        let mut record = LogRecord::new(level, message, "main");
        if let Some(ref child) = child {
            record = record.with_child_label(child.clone());
        }

        let parsed: LogRecord = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        prop_assert_eq!(&parsed.message, &record.message);
        prop_assert_eq!(parsed.level, level);
        prop_assert_eq!(parsed.child_label, child);
        prop_assert_eq!(
            parsed.timestamp.timestamp_millis(),
            record.timestamp.timestamp_millis()
        );
    }
}

// ============================================================================
// File Sink Option Tests
// ============================================================================

proptest! {
    /// Test that size suffixes scale by powers of 1024
    #[test]
    fn test_parse_size_units(n in 1u64..1_000_000) {
        prop_assert_eq!(parse_size(&n.to_string()).unwrap(), n);
        prop_assert_eq!(parse_size(&format!("{}k", n)).unwrap(), n * 1024);
        prop_assert_eq!(parse_size(&format!("{}M", n)).unwrap(), n * 1024 * 1024);
    }

    /// Test that retention accepts counts and day suffixes
    #[test]
    fn test_retention_forms(n in 1u32..10_000) {
        prop_assert_eq!(Retention::parse(&n.to_string()).unwrap(), Retention::Count(n as usize));
        prop_assert_eq!(Retention::parse(&format!("{}d", n)).unwrap(), Retention::Days(n));
    }

    /// Test that non-numeric retention is rejected as configuration
    #[test]
    fn test_retention_rejects_words(word in "[a-ce-z]{1,8}") {
        let err = Retention::parse(&word).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
