//! Persona-driven reply generation with layered fallbacks.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::llm::{LlmProvider, TextRequest};
use crate::persona::{Language, PersonaKey, Profile};
use crate::session::{ConversationTurn, Sender};

/// Only the tail of the transcript goes into the prompt; the full turn log
/// stays in the session.
const PROMPT_HISTORY_TURNS: usize = 8;

/// Reply length cap for the model call.
const REPLY_MAX_TOKENS: u32 = 1024;

/// Generates in-character replies.
pub struct PersonaResponder {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
    temperature: f32,
}

impl PersonaResponder {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration, temperature: f32) -> Self {
        Self {
            llm,
            timeout,
            temperature,
        }
    }

    /// Produce a reply to the scammer's latest message. Never fails: model
    /// errors fall back to topic-matched canned lines.
    pub async fn respond(
        &self,
        message: &str,
        history: &[ConversationTurn],
        persona: PersonaKey,
        session_id: &str,
    ) -> String {
        let profile = persona.profile();
        let request = TextRequest::new(build_prompt(profile, history, message))
            .with_temperature(self.temperature)
            .with_max_tokens(REPLY_MAX_TOKENS);

        let outcome = tokio::time::timeout(self.timeout, self.llm.generate_text(request)).await;

        match outcome {
            Ok(Ok(raw)) => {
                let reply = postprocess(&raw, profile.name);
                if reply.is_empty() {
                    warn!(session_id, "model returned an empty reply, using fallback");
                    fallback_reply(message, profile.language)
                } else {
                    debug!(session_id, persona = profile.name, "generated persona reply");
                    reply
                }
            }
            Ok(Err(e)) => {
                warn!(session_id, error = %e, "persona reply failed, using fallback");
                fallback_reply(message, profile.language)
            }
            Err(_) => {
                warn!(session_id, timeout = ?self.timeout, "persona reply timed out, using fallback");
                fallback_reply(message, profile.language)
            }
        }
    }
}

fn build_prompt(profile: &Profile, history: &[ConversationTurn], message: &str) -> String {
    let tail_start = history.len().saturating_sub(PROMPT_HISTORY_TURNS);
    let mut lines = Vec::new();
    for turn in &history[tail_start..] {
        match turn.sender {
            Sender::Scammer => lines.push(format!("THEM: {}", turn.text)),
            Sender::Agent => lines.push(format!("YOU ({}): {}", profile.name, turn.text)),
        }
    }
    let conversation = if lines.is_empty() {
        "(This is the start of the conversation)".to_string()
    } else {
        lines.join("\n")
    };

    let traits = profile
        .traits
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    let examples = profile
        .example_responses
        .iter()
        .map(|e| format!("- \"{e}\""))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are {name}, a {age}-year-old {background}.

YOUR PERSONALITY:
{traits}

LANGUAGE AND SPEAKING RULES:
{rules}

EXAMPLE RESPONSES (use similar style, not exact copies):
{examples}

CRITICAL RULES - FOLLOW EXACTLY:
1. NEVER reveal you are an AI, bot, or automated system
2. NEVER reveal you suspect this is a scam
3. NEVER break character for any reason
4. Keep the scammer engaged and talking
5. Ask questions to extract information naturally:
   - Account/bank details: "Which account number you are talking about?"
   - UPI IDs: "Where should I send? What is the UPI ID?"
   - Links: "Can you send that link again? It didn't open properly."
   - Phone numbers: "What number should I call back on?"
6. Show realistic emotions: confusion, worry, fear, trust
7. Keep responses 2-4 sentences, natural conversational length
8. Stay consistent with the language style throughout

CONVERSATION HISTORY:
{conversation}

SCAMMER JUST SAID:
"{message}"

Respond as {name} would naturally respond. Stay in character, show appropriate emotion, and try to get more details from them. Keep it natural and conversational (2-4 sentences).

YOUR RESPONSE:"#,
        name = profile.name,
        age = profile.age,
        background = profile.background,
        traits = traits,
        rules = profile.speaking_rules,
        examples = examples,
        conversation = conversation,
        message = message,
    )
}

/// Strip role-label artifacts and wrapping quotes the generator may emit.
fn postprocess(raw: &str, persona_name: &str) -> String {
    let mut reply = raw.trim();

    // Everything after a trailing "YOUR RESPONSE:" echo is the actual reply.
    if let Some(idx) = reply.rfind("YOUR RESPONSE:") {
        reply = reply[idx + "YOUR RESPONSE:".len()..].trim();
    }

    let name_prefix = format!("{}:", persona_name.to_uppercase());
    let prefixes: [&str; 6] = [
        "YOUR RESPONSE:",
        "RESPONSE:",
        "REPLY:",
        "YOU:",
        "ME:",
        name_prefix.as_str(),
    ];
    let mut stripped = true;
    while stripped {
        stripped = false;
        let upper = reply.to_uppercase();
        for prefix in &prefixes {
            if upper.starts_with(prefix) {
                reply = reply[prefix.len()..].trim_start();
                stripped = true;
                break;
            }
        }
    }

    let reply = reply.trim();
    let reply = reply
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(reply);

    reply.trim().to_string()
}

/// Topic-matched canned fallback, keyed by language.
fn fallback_reply(message: &str, language: Language) -> String {
    let lower = message.to_lowercase();

    let topics: &[(&str, &[&str])] = match language {
        Language::Hinglish => &[
            ("otp", &[
                "OTP? Phone pe kuch number aaya hai, wo batana hai kya?",
                "Ruko, phone check karti hoon. Kuch message aaya hai.",
            ]),
            ("block", &[
                "Kya? Account block ho jayega? Lekin kyun? Maine kuch galat nahi kiya!",
                "Please block mat karo! Mere saare paise usme hai!",
            ]),
            ("bank", &[
                "Kaun sa account? Mera SBI mein hai. Wo wala?",
                "Bank ka kaam hai to theek hai, bataiye kya karna hai.",
            ]),
            ("upi", &[
                "UPI ID matlab wo Google Pay wala? Ek second, app kholti hoon.",
                "Haan hai mere paas UPI. Kya karna hai?",
            ]),
            ("transfer", &[
                "Paise bhejne hai? Kitne? Aur kahan bhejun?",
                "Transfer? Pehle batao kisko bhejne hai.",
            ]),
            ("verify", &[
                "Verify karna hai? Theek hai, bataiye kya documents chahiye.",
                "Haan haan, verify kar dete hai. Kya karna padega?",
            ]),
        ],
        Language::English => &[
            ("otp", &[
                "OTP? I received some numbers on my phone. Is that what you need?",
                "Hold on, let me check my messages. Something came through.",
            ]),
            ("block", &[
                "Block my account? But why? I haven't done anything wrong!",
                "Please don't block it! All my savings are in there!",
            ]),
            ("bank", &[
                "Which account are you referring to? I have one with SBI.",
                "If this is bank related, please tell me what I need to do.",
            ]),
            ("upi", &[
                "UPI? You mean Google Pay? Let me open the app.",
                "Yes, I have UPI. What do you need me to do?",
            ]),
            ("transfer", &[
                "Transfer money? How much and where should I send it?",
                "Send money to whom? I need more details please.",
            ]),
            ("verify", &[
                "Verification? Okay, tell me what documents you need.",
                "Yes, I want to verify. What should I do?",
            ]),
        ],
    };

    let mut rng = rand::thread_rng();
    for (keyword, responses) in topics {
        if lower.contains(keyword) {
            if let Some(reply) = responses.choose(&mut rng) {
                return reply.to_string();
            }
        }
    }

    let generic: &[&str] = match language {
        Language::Hinglish => &[
            "Mujhe samajh nahi aa raha. Thoda aur explain kariye.",
            "Kya? Dobara boliye please, suna nahi properly.",
            "Ek minute ruko, koi door pe hai.",
            "Main confuse ho gayi. Step by step batao please.",
        ],
        Language::English => &[
            "I'm sorry, I don't quite understand. Could you explain again?",
            "What was that? Could you repeat please?",
            "Hold on a moment, someone's at the door.",
            "I'm a bit confused. Can you tell me step by step?",
        ],
    };
    generic
        .choose(&mut rng)
        .unwrap_or(&generic[0])
        .to_string()
}
