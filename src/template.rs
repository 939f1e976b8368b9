//! Publisher templates.
//!
//! The template names the publisher LaTeX class the output is meant for.
//! It is accepted and reported, but the field normalization does not
//! depend on it yet.

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Publisher style the output `.bib` file should be prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
pub enum PublisherTemplate {
    #[default]
    #[value(name = "non-strict")]
    NonStrict,
    #[value(name = "Wiley-NJDv5")]
    WileyNjdV5,
    #[value(name = "Wiley-book")]
    WileyBook,
    #[value(name = "Springer-sn-jnl")]
    SpringerSnJnl,
    #[value(name = "Springer-LNCS")]
    SpringerLncs,
    #[value(name = "IEEE-tran")]
    IeeeTran,
    #[value(name = "ACM-acmart")]
    AcmAcmart,
    #[value(name = "Elsevier-elsarticle")]
    ElsevierElsarticle,
    #[value(name = "Sage-sagej")]
    SageSagej,
}

/// Single source of truth for template names: (template, name, LaTeX class).
const TEMPLATES: &[(PublisherTemplate, &str, &str)] = &[
    (PublisherTemplate::NonStrict, "non-strict", "any"),
    (PublisherTemplate::WileyNjdV5, "Wiley-NJDv5", "WileyNJD-v5"),
    (PublisherTemplate::WileyBook, "Wiley-book", "wileySev"),
    (PublisherTemplate::SpringerSnJnl, "Springer-sn-jnl", "sn-jnl"),
    (PublisherTemplate::SpringerLncs, "Springer-LNCS", "llncs"),
    (PublisherTemplate::IeeeTran, "IEEE-tran", "IEEEtran"),
    (PublisherTemplate::AcmAcmart, "ACM-acmart", "acmart"),
    (PublisherTemplate::ElsevierElsarticle, "Elsevier-elsarticle", "elsarticle"),
    (PublisherTemplate::SageSagej, "Sage-sagej", "sagej"),
];

impl PublisherTemplate {
    /// Command-line name of the template.
    pub fn name(self) -> &'static str {
        Self::lookup(self).1
    }

    /// LaTeX document class the template corresponds to.
    pub fn latex_class(self) -> &'static str {
        Self::lookup(self).2
    }

    fn lookup(self) -> &'static (PublisherTemplate, &'static str, &'static str) {
        TEMPLATES
            .iter()
            .find(|(t, _, _)| *t == self)
            .unwrap_or(&TEMPLATES[0])
    }
}

impl fmt::Display for PublisherTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the list of template names.
pub fn template_names() -> Vec<&'static str> {
    TEMPLATES.iter().map(|(_, n, _)| *n).collect()
}
