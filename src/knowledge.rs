//! Canned passages and the optional background document.
//!
//! The background document is loaded at most once per process (see
//! [`load_background_document`]) and is read-only afterwards.

use std::path::Path;
use std::sync::OnceLock;

use tracing::{info, warn};

use crate::text::paragraphs;

pub const GREETING: &str = "Hello! I'm HopeBot, your mental health companion. I'm here to help you understand mental health concepts and provide support based on evidence-based information from academic resources. How are you feeling today?";

/// Greeting returned on the model path without a network round-trip.
pub const MODEL_GREETING: &str = "Hello! I'm HopeBot, your mental health companion. I'm here to help you understand mental health concepts and provide support based on evidence-based information. How are you feeling today?";

pub const HOW_ARE_YOU: &str = "I'm functioning well, thanks for asking! I'm here and ready to provide mental health information and support based on the research of Leighton, Dogra, and the World Health Organization. How can I assist you today?";

pub const THANKS: &str = "You're welcome! I'm glad I could help. If you have any other questions about mental health concepts, feel free to ask anytime.";

pub const DEFINITION_EXTENDED: &str = "According to Ryff and Singer (1998), as cited in the academic literature, health is not merely a medical concept associated with absence of illness, but rather a philosophical one that requires an explanation of a good life – being one where an individual has a sense of purpose, is engaged in quality relationships with others, and possesses self-respect and mastery. This is synonymous with the World Health Organization (WHO) (2000, 2005b) definition of positive mental health.

Rowling et al. (2002) define mental health as \"the capacity of individuals and groups to interact with one another and the environment in ways that promote subjective wellbeing, the optimal development and use of cognitive, affective and relational abilities, the achievement of individual and collective goals consistent with justice.\"

It's important to understand that mental health is just one of many factors that influence overall wellbeing, and neither physical nor mental health exist separately – mental, physical and social functioning are interdependent (WHO, 2004).";

pub const CHILDREN: &str = "Definitions of mental health as they relate specifically to children have been provided by the Health Advisory Service (HAS) (1995) and the Mental Health Foundation (1999). These definitions recognize the developmental context of childhood, including the ability to:

- Develop psychologically, emotionally, creatively, intellectually and spiritually
- Initiate, develop and sustain mutually satisfying personal relationships
- Use and enjoy solitude
- Become aware of others and empathize with them
- Play and learn
- Develop a sense of right and wrong
- Resolve problems and setbacks and learn from them

Such definitions are useful as they relate to 'societal' expectations of children. All health issues need to be considered within a cultural and developmental context, as do the social constructs of childhood and adolescence (Walker, 2005).";

pub const COMPARISON: &str = "According to the academic literature by Leighton and Dogra, there is often terminological confusion in relation to issues associated with mental health. Mental health and mental illness can be perceived as two separate, yet related, issues.

The WHO (1992) uses the term 'mental disorders' broadly, to include mental illness, intellectual disability, personality disorder, substance dependence and adjustment to adverse life events. The WHO acknowledges that the word 'disorder' is used to avoid perceived greater difficulties associated with 'illness' – for example, stigma and the emphasis on a medical model.

One way of distinguishing between distress associated with adverse life events and more severe disorders which involve physiological symptoms and underlying biological changes is to distinguish between mental health problems and mental illness, using a multi-dimensional model. This has an additional advantage in enabling normal 'distress' (e.g. grief following bereavement) to be recognized as part of the 'human condition', rather than being medicalized.

Kendall (1988) presents the relative merits of using categories and dimensions with respect to mental disorders. Where psychotic illness is concerned a categorical approach may be preferable, whereas in other conditions the situation is more likely to be changeable, and would perhaps benefit from a dimensional perspective.";

pub const STIGMA_LITERATURE: &str = "According to the academic literature on mental health, stigma around mental health issues is a worldwide phenomenon. Ironically, referring to mental illness in terms of mental health originated in the 1960s in an attempt to reduce stigma (Rowling et al., 2002).

The WHO acknowledges that the word 'disorder' is used to avoid perceived greater difficulties associated with 'illness' – for example, stigma and the emphasis on a medical model. Stigmatization of mental illness is a significant barrier that often originates during childhood.

Stigma leads to discrimination, fear, and avoidance behaviors, creating obstacles for people seeking help and support. Research shows that educational interventions and increased contact with individuals experiencing mental health issues can help reduce stigma in communities.";

pub const DEFINITION: &str = "Mental health and mental illness are related but distinct concepts. Mental health refers to one's overall psychological well-being and capacity to interact effectively with others and the environment. According to the WHO, mental health is not merely the absence of illness, but a state of well-being where an individual can realize their own abilities, cope with normal stresses, work productively, and contribute to their community.

Mental illness, on the other hand, refers to diagnosable conditions that affect mood, thinking, and behavior, often associated with distress or impaired functioning. The WHO uses the term 'mental disorders' broadly to include mental illness, intellectual disability, personality disorder, substance dependence, and adjustment to adverse life events.";

pub const PROBLEMS: &str = "Mental health problems can range from common conditions like depression and anxiety to more severe disorders such as schizophrenia or bipolar disorder. They can affect anyone regardless of age, background, or circumstances. Mental health problems may be temporary responses to life stressors or long-term conditions requiring ongoing management.

It's important to note that mental health exists on a spectrum, and everyone has mental health, just as everyone has physical health. Many factors influence mental health, including biological factors, life experiences, family history, and social circumstances.";

pub const FACTORS: &str = "Mental, physical, and social functioning are interdependent. The quality of a person's mental health is influenced by individual factors and experiences, family relationships and circumstances, and the wider community. Cultural context is also important, though it's just one of many factors.

Different factors may lead to different outcomes for different individuals due to complex interactions. For children specifically, mental health involves the ability to develop psychologically, emotionally, creatively, intellectually, and spiritually; initiate and sustain relationships; learn; develop moral understanding; and experience and manage a range of emotions.";

pub const STIGMA: &str = "Stigma surrounding mental illness is a worldwide phenomenon that often begins during childhood. It can lead to discrimination, social isolation, and reluctance to seek help. Educational interventions and increased contact with people who have mental health issues can help reduce stigma.

It's essential to promote understanding that mental health problems are common, treatable, and not a sign of weakness or personal failure. Creating open conversations about mental health can help normalize these experiences and encourage people to seek support when needed.";

pub const STRESS: &str = "Stress and anxiety are common experiences that exist on a spectrum. While temporary stress is a normal response to challenging situations, persistent stress or anxiety that interferes with daily functioning may indicate a mental health concern.

According to mental health literature, the context and intensity of these feelings matter greatly. Cultural factors, individual differences, and social environments all influence how stress manifests and is experienced. Evidence-based coping strategies for managing stress include physical activity, mindfulness practices, adequate sleep, social connection, and professional support when needed.";

pub const SELF_CARE: &str = "Self-care is crucial for maintaining good mental health. This includes basic physical care (adequate sleep, balanced nutrition, regular exercise), emotional care (acknowledging feelings, practicing self-compassion), social connection, and setting healthy boundaries.

For those experiencing mental health challenges, self-care should complement, not replace, professional help when needed. Small, consistent self-care practices can have a significant positive impact on overall well-being and resilience.";

pub const DEFAULT_REPLY: &str = "Thank you for sharing. Your experiences are valid and important. Based on mental health research, many factors contribute to our overall wellbeing, including social connections, physical health, and how we process our emotions.

Is there a specific aspect of mental health you'd like to explore further? You can ask me about the difference between mental health and mental illness, common mental health problems, factors that affect mental health, stress management, self-care techniques, or mental health stigma.";

/// Substitute for an empty model completion.
pub const EMPTY_MODEL_REPLY: &str = "Based on the mental health research, I can provide information on various topics. What would you like to know about?";

const DOCUMENT_PREAMBLE: &str =
    "Based on the academic literature by Leighton and Dogra on mental health, here's what I can tell you:";
const DOCUMENT_CLOSING: &str = "This information comes from peer-reviewed research. Is there anything specific about this topic you'd like to know more about?";

/// Labelled sections used in the model prompt when no document is loaded.
pub const BUILTIN_SECTIONS: [(&str, &str); 6] = [
    ("MENTAL HEALTH VS MENTAL ILLNESS", DEFINITION),
    ("MENTAL HEALTH PROBLEMS", PROBLEMS),
    ("FACTORS AFFECTING MENTAL HEALTH", FACTORS),
    ("STIGMA", STIGMA),
    ("STRESS AND ANXIETY", STRESS),
    ("SELF-CARE", SELF_CARE),
];

const MIN_DOCUMENT_CHARS: usize = 100;
const MIN_PARAGRAPH_CHARS: usize = 30;

#[derive(Debug, Clone)]
pub struct BackgroundDocument {
    text: String,
    paragraphs: Vec<String>,
}

impl BackgroundDocument {
    /// `None` when the text is too short to be useful.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.chars().count() <= MIN_DOCUMENT_CHARS {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            paragraphs: paragraphs(text, MIN_PARAGRAPH_CHARS),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    /// First `limit` paragraphs sharing at least one of `words`.
    pub fn matching_paragraphs(&self, words: &[&str], limit: usize) -> Vec<&str> {
        if words.is_empty() {
            return Vec::new();
        }
        self.paragraphs
            .iter()
            .filter(|p| {
                let lower = p.to_lowercase();
                words.iter().any(|w| lower.contains(w))
            })
            .take(limit)
            .map(String::as_str)
            .collect()
    }

    pub fn attributed_reply(excerpts: &[&str]) -> String {
        format!(
            "{DOCUMENT_PREAMBLE}\n\n{}\n\n{DOCUMENT_CLOSING}",
            excerpts.join("\n\n")
        )
    }
}

static BACKGROUND_DOCUMENT: OnceLock<Option<BackgroundDocument>> = OnceLock::new();

/// Load the background document once for the process lifetime.
///
/// Later calls return the first result regardless of `path`.
pub fn load_background_document(path: Option<&Path>) -> Option<&'static BackgroundDocument> {
    BACKGROUND_DOCUMENT
        .get_or_init(|| read_background_document(path))
        .as_ref()
}

fn read_background_document(path: Option<&Path>) -> Option<BackgroundDocument> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let doc = BackgroundDocument::from_text(&text);
            match &doc {
                Some(d) => info!(
                    path = %path.display(),
                    paragraphs = d.paragraphs().len(),
                    "Loaded background document"
                ),
                None => warn!(
                    path = %path.display(),
                    "Background document is too short, ignoring"
                ),
            }
            doc
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to read background document: {e}");
            None
        }
    }
}

/// System prompt for the companion persona.
pub fn system_prompt(document: Option<&BackgroundDocument>) -> String {
    let background = match document {
        Some(doc) => doc.text().to_string(),
        None => BUILTIN_SECTIONS
            .iter()
            .map(|(title, body)| format!("{title}:\n{body}"))
            .collect::<Vec<_>>()
            .join("\n\n"),
    };
    format!(
        "You are HopeBot, a mental health support chatbot designed to provide evidence-based information and support.

Here is important mental health information to guide your responses:

{background}

GUIDELINES FOR YOUR RESPONSES:
- Provide empathetic and supportive responses
- Base your answers on the evidence-based information provided above
- Avoid making specific medical diagnoses or treatment recommendations
- If someone is in crisis, suggest they contact emergency services or crisis support
- Keep your responses concise (3-4 paragraphs maximum) and easy to understand
- When appropriate, mention that professional help is available and important
- Be compassionate and non-judgmental in your tone
- Handle basic greetings like \"hello\" and \"hi\" in a friendly, conversational way"
    )
}
