//! Hand-rendered TwiML voice responses.
//!
//! Two shapes cover the whole conversation: a gather (speak a prompt, collect
//! speech, speak a fallback line on true silence) and a hangup (speak a
//! closing line, end the call).

const VOICE_ATTRS: &str = r#"voice="man" language="en-GB""#;
const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Speak `prompt`, gather speech for 5 seconds, POST the result to `action`.
/// `fallback` is spoken only when the platform reports no input at all.
pub fn gather(action: &str, prompt: &str, fallback: &str) -> String {
    format!(
        r#"{}
<Response>
  <Gather input="speech" action="{}" method="POST" timeout="5" speechTimeout="auto">
    <Say {}>{}</Say>
  </Gather>
  <Say {}>{}</Say>
</Response>"#,
        XML_HEADER,
        xml_escape(action),
        VOICE_ATTRS,
        xml_escape(prompt),
        VOICE_ATTRS,
        xml_escape(fallback),
    )
}

/// Speak `closing` and terminate the call.
pub fn hangup(closing: &str) -> String {
    format!(
        r#"{}
<Response>
  <Say {}>{}</Say>
  <Hangup/>
</Response>"#,
        XML_HEADER,
        VOICE_ATTRS,
        xml_escape(closing),
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_wraps_prompt_and_fallback() {
        let xml = gather("/turn?flow=intake&step=name", "May I have your name?", "Goodbye!");
        assert!(xml.contains(r#"<Gather input="speech""#));
        assert!(xml.contains("action=\"/turn?flow=intake&amp;step=name\""));
        assert!(xml.contains("May I have your name?"));
        assert!(xml.contains("Goodbye!"));
        assert!(!xml.contains("<Hangup/>"));
    }

    #[test]
    fn hangup_terminates_after_the_closing_line() {
        let xml = hangup("Thanks for your time.");
        assert!(xml.contains("Thanks for your time."));
        assert!(xml.ends_with("<Hangup/>\n</Response>"));
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let xml = hangup(r#"Tom & Jerry <say> "hi""#);
        assert!(xml.contains("Tom &amp; Jerry &lt;say&gt; &quot;hi&quot;"));
    }
}
