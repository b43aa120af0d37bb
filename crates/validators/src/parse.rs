/// The `APPROVE` / `DENY: <reason>` grammar shared by Tool-Approve and
/// Claude-MD-Validate.
pub enum GateReply {
    Approve,
    Deny(String),
}

pub fn parse_gate_reply(text: &str) -> GateReply {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("APPROVE") || trimmed.to_uppercase().starts_with("APPROVE") {
        return GateReply::Approve;
    }
    if let Some(reason) = strip_prefix_ci(trimmed, "DENY:") {
        return GateReply::Deny(reason.trim().to_string());
    }
    if trimmed.eq_ignore_ascii_case("DENY") {
        return GateReply::Deny("denied".to_string());
    }
    GateReply::Deny(format!("Malformed response: {trimmed}"))
}

/// The `OK` / `<TAG>: <reason>` grammar shared by Error-Acknowledge
/// (`BLOCK`), Plan-Validate (`DRIFT`), and Intent-Validate (`INTERVENE`).
pub enum GateOk {
    Ok,
    Blocked(String),
}

pub fn parse_ok_or(text: &str, tag: &str) -> GateOk {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("OK") {
        return GateOk::Ok;
    }
    let prefix = format!("{tag}:");
    if let Some(reason) = strip_prefix_ci(trimmed, &prefix) {
        return GateOk::Blocked(reason.trim().to_string());
    }
    GateOk::Blocked(format!("Malformed response: {trimmed}"))
}

/// The `UPHOLD` / `OVERTURN: APPROVE` / `OVERTURN: <reason>` / legacy
/// `DENY`/`DENY: <reason>` grammar Tool-Appeal alone uses. A malformed
/// reply defaults to `Uphold` — the safe default, since the original
/// denial is always "technically correct" per spec.md §4.5.
pub enum AppealReply {
    Uphold,
    OverturnApprove,
    Overturn(String),
    Deny(Option<String>),
}

pub fn parse_appeal_reply(text: &str) -> AppealReply {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("UPHOLD") {
        return AppealReply::Uphold;
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "OVERTURN:") {
        let rest = rest.trim();
        return if rest.eq_ignore_ascii_case("APPROVE") {
            AppealReply::OverturnApprove
        } else {
            AppealReply::Overturn(rest.to_string())
        };
    }
    if let Some(reason) = strip_prefix_ci(trimmed, "DENY:") {
        return AppealReply::Deny(Some(reason.trim().to_string()));
    }
    if trimmed.eq_ignore_ascii_case("DENY") {
        return AppealReply::Deny(None);
    }
    AppealReply::Uphold
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_reply_parses_approve_and_deny() {
        assert!(matches!(parse_gate_reply("APPROVE"), GateReply::Approve));
        assert!(matches!(parse_gate_reply("DENY: looks risky"), GateReply::Deny(r) if r == "looks risky"));
    }

    #[test]
    fn gate_reply_malformed_defaults_to_deny() {
        assert!(matches!(parse_gate_reply("sure, go ahead"), GateReply::Deny(_)));
    }

    #[test]
    fn gate_ok_parses_tagged_block() {
        assert!(matches!(parse_ok_or("OK", "BLOCK"), GateOk::Ok));
        assert!(matches!(parse_ok_or("BLOCK: already explained", "BLOCK"), GateOk::Blocked(r) if r == "already explained"));
        assert!(matches!(parse_ok_or("DRIFT: adds a timeline", "DRIFT"), GateOk::Blocked(_)));
    }

    #[test]
    fn appeal_reply_parses_all_variants() {
        assert!(matches!(parse_appeal_reply("UPHOLD"), AppealReply::Uphold));
        assert!(matches!(parse_appeal_reply("OVERTURN: APPROVE"), AppealReply::OverturnApprove));
        assert!(matches!(parse_appeal_reply("OVERTURN: user ran /deploy"), AppealReply::Overturn(_)));
        assert!(matches!(parse_appeal_reply("DENY: still risky"), AppealReply::Deny(Some(_))));
        assert!(matches!(parse_appeal_reply("DENY"), AppealReply::Deny(None)));
    }

    #[test]
    fn appeal_reply_malformed_defaults_to_uphold() {
        assert!(matches!(parse_appeal_reply("I think this is fine"), AppealReply::Uphold));
    }
}
