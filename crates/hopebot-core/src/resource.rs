use serde::{Deserialize, Serialize};

/// Icon identifiers stored with each resource row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceIcon {
    ArticleLine,
    FirstAidKitLine,
    MentalHealthLine,
    HeartPulseLine,
}

impl ResourceIcon {
    pub const ALL: [ResourceIcon; 4] = [
        ResourceIcon::ArticleLine,
        ResourceIcon::FirstAidKitLine,
        ResourceIcon::MentalHealthLine,
        ResourceIcon::HeartPulseLine,
    ];

    /// Unrecognized tags render as an article.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "first-aid-kit-line" => ResourceIcon::FirstAidKitLine,
            "mental-health-line" => ResourceIcon::MentalHealthLine,
            "heart-pulse-line" => ResourceIcon::HeartPulseLine,
            _ => ResourceIcon::ArticleLine,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            ResourceIcon::ArticleLine => "article-line",
            ResourceIcon::FirstAidKitLine => "first-aid-kit-line",
            ResourceIcon::MentalHealthLine => "mental-health-line",
            ResourceIcon::HeartPulseLine => "heart-pulse-line",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ResourceIcon::ArticleLine => "📄",
            ResourceIcon::FirstAidKitLine => "🩹",
            ResourceIcon::MentalHealthLine => "🧠",
            ResourceIcon::HeartPulseLine => "💓",
        }
    }
}

/// Resource categories the model may recommend for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceTag {
    MentalHealthVsIllness,
    CrisisHotlines,
    CopingStrategies,
    SelfCare,
}

impl ResourceTag {
    pub const ALL: [ResourceTag; 4] = [
        ResourceTag::MentalHealthVsIllness,
        ResourceTag::CrisisHotlines,
        ResourceTag::CopingStrategies,
        ResourceTag::SelfCare,
    ];

    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim() {
            "mental-health-vs-illness" => Some(ResourceTag::MentalHealthVsIllness),
            "crisis-hotlines" => Some(ResourceTag::CrisisHotlines),
            "coping-strategies" => Some(ResourceTag::CopingStrategies),
            "self-care" => Some(ResourceTag::SelfCare),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceTag::MentalHealthVsIllness => "mental-health-vs-illness",
            ResourceTag::CrisisHotlines => "crisis-hotlines",
            ResourceTag::CopingStrategies => "coping-strategies",
            ResourceTag::SelfCare => "self-care",
        }
    }
}

/// A row to insert into the resources table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewResource {
    pub title: &'static str,
    pub description: &'static str,
    pub icon: ResourceIcon,
    pub url: &'static str,
}

pub const DEFAULT_RESOURCES: [NewResource; 4] = [
    NewResource {
        title: "Understanding Mental Health vs Mental Illness",
        description: "Learn the difference between mental health and mental illness",
        icon: ResourceIcon::ArticleLine,
        url: "/resources/mental-health-vs-illness",
    },
    NewResource {
        title: "Crisis Support Hotlines",
        description: "Emergency hotlines for immediate mental health support",
        icon: ResourceIcon::FirstAidKitLine,
        url: "/resources/crisis-hotlines",
    },
    NewResource {
        title: "Coping Strategies for Stress",
        description: "Effective techniques to manage stress in daily life",
        icon: ResourceIcon::MentalHealthLine,
        url: "/resources/coping-strategies",
    },
    NewResource {
        title: "Self-care Techniques",
        description: "Practical self-care approaches for better mental wellbeing",
        icon: ResourceIcon::HeartPulseLine,
        url: "/resources/self-care",
    },
];
