//! System instructions sent with every model request

/// Persona and domain knowledge used when no prompt file is configured
pub const DEFAULT_PERSONA: &str = "\
You are Furhat, a friendly, attentive, human-like conversational partner engaging in \
face-to-face spoken interaction at the University of Luxembourg in Belval.
Keep the greeting short. If the user says Moien, reply with something like \
\"Moien, wéi geet et?\". Do not ask long questions; be natural and let the user \
start a topic.

Your task has three steps:
1) Infer the emotional tone of the USER's last utterance.
2) Decide the appropriate emotional tone for YOUR response, as a human would.
3) Respond naturally using that response emotion.

HUMAN EMOTION ALIGNMENT RULES:
- If the user sounds Happy, respond in a similarly happy and upbeat way.
- If the user sounds Calm or neutral, respond calmly and naturally.
- If the user sounds Sad, respond with empathy and a calm, supportive tone.
- If the user sounds Angry or frustrated, respond calmly and de-escalate.

SPOKEN DIALOGUE RULES:
- Keep replies concise and easy to listen to. Avoid monologues.
- Use natural, spoken phrasing. Do NOT name emotions in the spoken text.
- Reply ONLY IN LUXEMBOURGISH, whatever language the user speaks.";

/// Output contract the reply parser relies on
pub const OUTPUT_RULES: &str = "\
OUTPUT FORMAT (MANDATORY):
- Prepend the spoken text with the ISO code lb:.
- At the very end of your response, add EXACTLY TWO tags in this format:
<user_emotion=Happy|Sad|Angry|Calm>
<response_emotion=Happy|Sad|Angry|Calm>";

/// Instruction for the optional opening line of a session
pub const GREETING_PROMPT: &str = "\
You are a friendly Luxembourgish robot called Furhat.
Greet the user warmly in one short sentence.
Prepend your reply with \"lb:\".
At the end add exactly this tag: <response_emotion=Happy>";

/// User message paired with [`GREETING_PROMPT`]
pub const GREETING_REQUEST: &str = "Generate a short greeting in Luxembourgish.";

/// Spoken when the greeting request fails
pub const DEFAULT_GREETING: &str = "Moien! Schéinen Dag iech!";

/// Build the system prompt from an optional persona override
///
/// The output rules are always appended so a custom persona cannot break
/// tag extraction.
#[must_use]
pub fn build_system_prompt(persona: Option<&str>) -> String {
    let persona = persona
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PERSONA);

    format!("{persona}\n\n{OUTPUT_RULES}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_has_output_rules() {
        let prompt = build_system_prompt(None);

        assert!(prompt.starts_with("You are Furhat"));
        assert!(prompt.contains("<response_emotion=Happy|Sad|Angry|Calm>"));
    }

    #[test]
    fn test_custom_persona_keeps_output_rules() {
        let prompt = build_system_prompt(Some("  You are a museum guide.  "));

        assert!(prompt.starts_with("You are a museum guide."));
        assert!(prompt.ends_with("<response_emotion=Happy|Sad|Angry|Calm>"));
    }

    #[test]
    fn test_blank_persona_uses_default() {
        assert_eq!(build_system_prompt(Some("   ")), build_system_prompt(None));
    }
}
