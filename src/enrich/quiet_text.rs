//! Short-text substitution. When *quiet text* is enabled for tap
//! operations, replace `operation` by its two-letter code. When enabled
//! for direction, replace `type` by `Q`/`R`.

use crate::config::QuietTextConfig;
use crate::envelope::TapOperation;
use crate::record::NormalizedRecord;

pub fn apply_quiet_text(record: &mut NormalizedRecord, config: &QuietTextConfig, operation: Option<TapOperation>) {
    if config.dnstap {
        if let Some(op) = operation {
            record.dns.operation = op.short_text().to_string();
        }
    }
    if config.dns {
        record.dns.direction = match record.dns.direction.as_str() {
            "query" => "Q".to_string(),
            "reply" => "R".to_string(),
            other => other.to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_operation_code() {
        let mut record = NormalizedRecord::default();
        record.dns.operation = "CLIENT_QUERY".to_string();
        record.dns.direction = "query".to_string();
        let config = QuietTextConfig { dnstap: true, dns: false };
        apply_quiet_text(&mut record, &config, Some(TapOperation::ClientQuery));
        assert_eq!(record.dns.operation, "CQ");
        assert_eq!(record.dns.direction, "query");
    }

    #[test]
    fn substitutes_direction() {
        let mut record = NormalizedRecord::default();
        record.dns.direction = "reply".to_string();
        let config = QuietTextConfig { dnstap: false, dns: true };
        apply_quiet_text(&mut record, &config, None);
        assert_eq!(record.dns.direction, "R");
    }

    #[test]
    fn disabled_by_default_leaves_fields_untouched() {
        let mut record = NormalizedRecord::default();
        record.dns.operation = "CLIENT_QUERY".to_string();
        record.dns.direction = "query".to_string();
        let config = QuietTextConfig::default();
        apply_quiet_text(&mut record, &config, Some(TapOperation::ClientQuery));
        assert_eq!(record.dns.operation, "CLIENT_QUERY");
        assert_eq!(record.dns.direction, "query");
    }
}
