//! TemplateRenderer - the placeholder `MessageRenderer`

use std::collections::BTreeSet;

use contracts::{BodyFormat, CampaignMetadata, Message, MessageRenderer, Recipient, TemplateError};
use tracing::debug;

use crate::context::RenderContext;
use crate::template::{Escape, Template};

/// Renders subject and body from templates compiled once per run
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    subject: Template,
    body: Template,
}

impl TemplateRenderer {
    /// Compile the campaign's subject and body templates
    ///
    /// # Errors
    /// - `TemplateError::Missing` if the body template is empty
    /// - `TemplateError::Syntax` if either template does not compile
    pub fn new(campaign: &CampaignMetadata) -> Result<Self, TemplateError> {
        if campaign.template.trim().is_empty() {
            return Err(TemplateError::Missing(
                "campaign body template is empty".to_string(),
            ));
        }

        let subject = Template::parse(&campaign.subject)?;
        let body = Template::parse(&campaign.template)?;
        debug!(
            subject_fields = subject.fields().count(),
            body_fields = body.fields().count(),
            "templates compiled"
        );

        Ok(Self { subject, body })
    }

    /// Fields referenced by subject and body
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.subject.fields().chain(self.body.fields())
    }

    /// Fields nothing in `campaign` can resolve, so every recipient must carry them
    pub fn attribute_fields<'a>(&'a self, campaign: &CampaignMetadata) -> BTreeSet<&'a str> {
        let probe = Recipient::new("", "");
        let ctx = RenderContext::new(campaign, &probe);
        self.fields().filter(|f| ctx.lookup(f).is_none()).collect()
    }
}

impl MessageRenderer for TemplateRenderer {
    fn render(
        &self,
        campaign: &CampaignMetadata,
        recipient: &Recipient,
    ) -> Result<Message, TemplateError> {
        let ctx = RenderContext::new(campaign, recipient);
        let lookup = |field: &str| ctx.lookup(field);

        // header line: no escaping, no line breaks
        let subject = self
            .subject
            .render(lookup, Escape::None)?
            .replace(['\r', '\n'], " ");

        let escape = match campaign.body_format {
            BodyFormat::Text => Escape::None,
            BodyFormat::Html => Escape::Html,
        };
        let body = self.body.render(lookup, escape)?;

        Ok(Message {
            from: campaign.from.clone(),
            to: recipient.mailbox(),
            to_address: recipient.email.clone(),
            subject,
            body,
            body_format: campaign.body_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn campaign(template: &str, body_format: BodyFormat) -> CampaignMetadata {
        CampaignMetadata {
            from: "News <news@x.com>".into(),
            subject: "Hello {{first_name}}".into(),
            template: template.into(),
            body_format,
            cta_text: Some("Read more".into()),
            cta_link: Some("https://x.com/?a=1&b=2".into()),
            variables: BTreeMap::from([("company".to_string(), "Acme".to_string())]),
        }
    }

    #[test]
    fn test_attribute_fields() {
        let campaign = campaign(
            "Hi {{name}} from {{ city }} on {{plan}} at {{company}}",
            BodyFormat::Text,
        );
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let fields: Vec<_> = renderer.attribute_fields(&campaign).into_iter().collect();
        assert_eq!(fields, vec!["city", "plan"]);
    }

    #[test]
    fn test_render_text_message() {
        let campaign = campaign(
            "Hi {{name}}, {{cta_text}}: {{cta_link}} -- {{company}}",
            BodyFormat::Text,
        );
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let message = renderer
            .render(&campaign, &Recipient::new("Alice Smith", "alice@x.com"))
            .unwrap();

        assert_eq!(message.from, "News <news@x.com>");
        assert_eq!(message.to, "Alice Smith <alice@x.com>");
        assert_eq!(message.to_address, "alice@x.com");
        assert_eq!(message.subject, "Hello Alice");
        assert_eq!(
            message.body,
            "Hi Alice Smith, Read more: https://x.com/?a=1&b=2 -- Acme"
        );
    }

    #[test]
    fn test_render_html_escapes_values() {
        let campaign = campaign(
            r#"<p>Hi {{name}}</p><a href="{{cta_link}}">{{cta_text}}</a>"#,
            BodyFormat::Html,
        );
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let message = renderer
            .render(&campaign, &Recipient::new("Tom <script>", "tom@x.com"))
            .unwrap();

        assert_eq!(
            message.body,
            r#"<p>Hi Tom &lt;script&gt;</p><a href="https://x.com/?a=1&amp;b=2">Read more</a>"#
        );
        // subject is a header, never escaped
        assert_eq!(message.subject, "Hello Tom");
    }

    #[test]
    fn test_missing_field_is_per_message() {
        let campaign = campaign("Your code: {{code}}", BodyFormat::Text);
        let renderer = TemplateRenderer::new(&campaign).unwrap();

        let err = renderer
            .render(&campaign, &Recipient::new("Bob", "b@x.com"))
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingField("code".into()));

        let carol = Recipient::new("Carol", "c@x.com").with_attribute("code", "XYZ");
        assert_eq!(
            renderer.render(&campaign, &carol).unwrap().body,
            "Your code: XYZ"
        );
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let campaign = campaign("<b>{{name}}</b> & {{company}}", BodyFormat::Html);
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let recipient = Recipient::new("Zoë \"Z\" O'Neil", "z@x.com").with_attribute("k", "v");

        let first = renderer.render(&campaign, &recipient).unwrap();
        let second = renderer.render(&campaign, &recipient).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_subject_line_breaks_removed() {
        let mut campaign = campaign("body", BodyFormat::Text);
        campaign.subject = "Hi {{name}}".into();
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let message = renderer
            .render(&campaign, &Recipient::new("Eve\r\nBcc: x@evil.com", "e@x.com"))
            .unwrap();
        assert!(!message.subject.contains('\n'));
        assert!(!message.subject.contains('\r'));
    }

    #[test]
    fn test_new_rejects_bad_templates() {
        let empty = campaign("   ", BodyFormat::Text);
        assert!(matches!(
            TemplateRenderer::new(&empty),
            Err(TemplateError::Missing(_))
        ));

        let broken = campaign("Hi {{name", BodyFormat::Text);
        assert!(matches!(
            TemplateRenderer::new(&broken),
            Err(TemplateError::Syntax { .. })
        ));
    }
}
