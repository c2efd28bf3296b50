//! Field resolution for one recipient of one campaign

use std::borrow::Cow;

use contracts::{CampaignMetadata, Recipient};

/// Values visible to a template while rendering one message
pub(crate) struct RenderContext<'a> {
    pub campaign: &'a CampaignMetadata,
    pub recipient: &'a Recipient,
}

impl<'a> RenderContext<'a> {
    pub fn new(campaign: &'a CampaignMetadata, recipient: &'a Recipient) -> Self {
        Self {
            campaign,
            recipient,
        }
    }

    /// Resolve `field`; `None` when nothing provides it
    pub fn lookup(&self, field: &str) -> Option<Cow<'a, str>> {
        self.recipient_builtin(field)
            .or_else(|| self.recipient_attribute(field))
            .or_else(|| self.campaign_builtin(field))
            .or_else(|| self.campaign.variables.get(field).map(|v| Cow::Borrowed(v.as_str())))
    }

    fn recipient_builtin(&self, field: &str) -> Option<Cow<'a, str>> {
        let recipient = self.recipient;
        match field {
            "name" => Some(Cow::Borrowed(recipient.name.as_str())),
            "email" => Some(Cow::Borrowed(recipient.email.as_str())),
            "first_name" => Some(Cow::Borrowed(recipient.first_name())),
            _ => None,
        }
    }

    /// Exact key first, then case-insensitive (CSV headers keep their case)
    fn recipient_attribute(&self, field: &str) -> Option<Cow<'a, str>> {
        let attributes = &self.recipient.attributes;
        attributes
            .get(field)
            .or_else(|| {
                attributes
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(field))
                    .map(|(_, value)| value)
            })
            .map(|v| Cow::Borrowed(v.as_str()))
    }

    fn campaign_builtin(&self, field: &str) -> Option<Cow<'a, str>> {
        let campaign = self.campaign;
        match field {
            "from" => Some(Cow::Borrowed(campaign.from.as_str())),
            "subject" => Some(Cow::Borrowed(campaign.subject.as_str())),
            "cta_text" => campaign.cta_text.as_deref().map(Cow::Borrowed),
            "cta_link" => campaign.cta_link.as_deref().map(Cow::Borrowed),
            _ => None,
        }
    }
}
