use crate::classifier::Category;

/// Per-category keyword weight tables. A weight reflects how strongly a
/// phrase signals its category; longer, more specific phrases carry more
/// weight than single common words.
pub fn dictionary(category: Category) -> &'static [(&'static str, f64)] {
    match category {
        Category::InterviewInvitation => &[
            ("interview", 2.0),
            ("phone screen", 1.5),
            ("technical interview", 1.5),
            ("schedule a call", 1.5),
            ("schedule", 1.0),
            ("available", 0.5),
            ("meet with", 0.5),
            ("chat with", 0.5),
        ],
        Category::Rejection => &[
            ("unfortunately", 2.0),
            ("not moving forward", 2.0),
            ("not selected", 2.0),
            ("regret to inform", 2.0),
            ("other candidates", 1.5),
            ("decided to proceed with other", 1.5),
            ("will not be", 1.0),
        ],
        Category::Offer => &[
            ("pleased to offer", 2.5),
            ("offer letter", 2.0),
            ("welcome to the team", 2.0),
            ("offer", 1.5),
            ("compensation", 1.0),
            ("start date", 1.0),
            ("salary", 0.5),
        ],
        Category::InformationRequest => &[
            ("additional information", 1.5),
            ("could you provide", 1.0),
            ("please send", 1.0),
            ("clarify", 1.0),
            ("documents", 0.5),
            ("references", 0.5),
        ],
        Category::FollowUpRequired => &[
            ("following up", 1.5),
            ("checking in", 1.0),
            ("status update", 1.0),
            ("any update", 1.0),
            ("wanted to follow up", 1.5),
        ],
        Category::Acknowledgment => &[
            ("received your application", 2.0),
            ("thank you for applying", 2.0),
            ("reviewing your application", 1.5),
            ("under review", 1.5),
            ("application has been received", 2.0),
        ],
        Category::SchedulingRequest => &[
            ("propose a time", 1.5),
            ("pick a time", 1.5),
            ("scheduling link", 1.5),
            ("book a time", 1.5),
            ("calendar", 1.0),
            ("calendly", 1.5),
        ],
        Category::Unknown => &[],
    }
}

pub const ALL_CATEGORIES: &[Category] = &[
    Category::InterviewInvitation,
    Category::Rejection,
    Category::Offer,
    Category::InformationRequest,
    Category::FollowUpRequired,
    Category::Acknowledgment,
    Category::SchedulingRequest,
];
