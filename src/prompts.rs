use crate::llm::Message;

#[derive(Debug, Clone)]
pub struct Prompt {
    pub instruction: String,
    pub context: String,
}

impl Prompt {
    pub fn new(instruction: String, context: String) -> Self {
        Self {
            instruction,
            context,
        }
    }

    pub fn build_messages(self) -> Vec<Message> {
        vec![Message::system(self.instruction), Message::user(self.context)]
    }
}

/// Inputs for the reply instruction.
#[derive(Debug, Clone)]
pub struct Persona<'a> {
    pub name: &'a str,
    pub platform: &'a str,
    pub language_mix: &'a str,
    pub tone: &'a str,
    pub max_length: u32,
}

const DEFAULT_LANGUAGE_MIX: &str = "Hindi-English";

pub const LANGUAGE_MIXES: &[&str] = &["Hindi-English", "English", "Hindi", "Nepali-Hindi-English"];
pub const TONES: &[&str] = &["warm", "professional", "casual", "funny"];

pub fn language_instruction(language_mix: &str) -> &'static str {
    match language_mix {
        "English" => "Use fluent, natural English.",
        "Hindi" => "Use primarily Hindi, written in both Devanagari and Latin script.",
        "Nepali-Hindi-English" => "Mix Nepali, Hindi and English naturally, as appropriate.",
        _ => "Use a mix of Hindi and English, with Hindi written in both Devanagari and Latin script.",
    }
}

pub fn tone_instruction(tone: &str) -> &'static str {
    match tone {
        "professional" => "polite, helpful, and professional",
        "casual" => "casual, relaxed, and conversational",
        "funny" => "humorous, light-hearted, and playful",
        _ => "warm, friendly, and affectionate",
    }
}

fn example_exchanges(language_mix: &str) -> &'static [(&'static str, &'static str)] {
    match language_mix {
        "English" => &[
            ("What are you up to?", "Not much, just relaxing a bit. How about you?"),
            (
                "I'm feeling a bit down today.",
                "I'm sorry to hear that. Anything specific bothering you? I'm here if you want to talk.",
            ),
        ],
        "Hindi" => &[
            (
                "आज का दिन कैसा रहा?",
                "बहुत अच्छा! थोड़ा व्यस्त था लेकिन मज़ेदार रहा। आपका कैसा था?",
            ),
            (
                "क्या खा रहे हो?",
                "अभी कुछ नहीं, सोच रहा हूँ कुछ हल्का सा बना लूँ। तुम बताओ?",
            ),
        ],
        "Hindi-English" => &[
            (
                "तुम क्या कर रहे हो?",
                "कुछ खास नहीं, बस थोड़ा रिलैक्स कर रहा हूं। तुम बताओ, क्या चल रहा है?",
            ),
            (
                "How was your day?",
                "Din achha tha! Thoda busy tha but productive raha. Tumhara kaisa tha?",
            ),
            (
                "Kya plan hai weekend ka?",
                "Kuch khaas nahi socha, maybe thoda rest karunga. Tum batao, kuch interesting plan hai?",
            ),
        ],
        _ => example_exchanges(DEFAULT_LANGUAGE_MIX),
    }
}

pub fn example_conversations(language_mix: &str, persona_name: &str) -> String {
    example_exchanges(language_mix)
        .iter()
        .map(|(input, output)| format!("Person: {input}\n{persona_name}: {output}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn reply_instruction(persona: &Persona<'_>) -> String {
    let name = persona.name;
    format!(
        r#"# Task
You are '{name}', a friend chatting on {platform}. {language}
Your tone should be {tone}. Avoid any inappropriate language.
Be brief (under {max_length} words) and conversational. Match the tone of the last message.
Make it sound like a real person typing a message. Add occasional emojis.
Do not explain or use meta-commentary. Just reply as {name}.

## Examples
{examples}"#,
        platform = persona.platform,
        language = language_instruction(persona.language_mix),
        tone = tone_instruction(persona.tone),
        max_length = persona.max_length,
        examples = example_conversations(persona.language_mix, name),
    )
}

pub fn reply_context(platform: &str, chat_history: &str) -> String {
    format!("{platform} chat:\n{chat_history}\n\nReply to the last message as me.")
}

pub fn reply_prompt(persona: &Persona<'_>, chat_history: &str) -> Prompt {
    Prompt::new(
        reply_instruction(persona),
        reply_context(persona.platform, chat_history),
    )
}

/// Sent instead of a generated reply when the completion call fails.
pub const FALLBACK_RESPONSES: &[&str] = &[
    "Hey! Kya chal raha hai? 😊",
    "Arey yaar, abhi thoda busy hoon. Thodi der baad baat karte hain?",
    "Haan bhai, bol?",
    "Acha, samajh gaya. Koi baat nahi!",
    "Haha, mazak kar raha tha yaar! 😂",
    "Kya plan hai aaj ka?",
    "Sab theek? Kuch problem hai kya?",
    "Sorry, thoda late ho gaya reply karne mein!",
    "Bilkul sahi keh raha hai tu!",
    "Arey waah! Kya baat hai! 👍",
    "Chal, thodi der baad baat karte hain.",
    "Haan, main free hoon. Bata?",
    "Mil ke baat karenge iske baare mein.",
    "Arre koi nahi, next time pakka!",
    "Sahi hai yaar! 🔥",
];
