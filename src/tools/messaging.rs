//! Messaging catalogue: `send_sms_notification` and `get_sent_messages`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::registry::{ParamSpec, ParamType, Tool, ToolDescriptor};
use super::{ToolPayload, ValidatedArguments};
use crate::backend::messaging::MessagingBackend;
use crate::backend::{Integration, with_deadline};
use crate::error::ToolError;
use crate::session::SessionState;

pub const SEND_SMS_NOTIFICATION: &str = "send_sms_notification";
pub const GET_SENT_MESSAGES: &str = "get_sent_messages";

const SEND_SMS_DESCRIPTION: &str = "Send an SMS notification to a patient via Twilio.

Use this tool to:
- Send care gap reminders to patients
- Notify patients about overdue screenings
- Send appointment reminders
- Deliver health education messages

The message should be personalized and culturally appropriate.
Consider the patient's preferred language when crafting the message.

Returns confirmation of message delivery or error details.";

const GET_SENT_DESCRIPTION: &str = "Get a list of SMS messages sent during this session.

Use this to review what messages have been sent and their status.
Useful for audit trails and confirming outreach completion.";

pub struct SendSmsTool {
    descriptor: ToolDescriptor,
    backend: Arc<dyn MessagingBackend>,
    deadline: Option<Duration>,
}

impl SendSmsTool {
    pub fn new(backend: Arc<dyn MessagingBackend>, deadline: Option<Duration>) -> Self {
        let descriptor = ToolDescriptor::new(SEND_SMS_NOTIFICATION, SEND_SMS_DESCRIPTION)
            .param(
                ParamSpec::required(
                    "phone_number",
                    ParamType::String,
                    "The patient's phone number in E.164 format (e.g., +15551234567)",
                )
                .non_empty()
                .required_message("Phone number is required"),
            )
            .param(
                ParamSpec::required(
                    "message_body",
                    ParamType::String,
                    "The SMS message content (max 160 chars recommended)",
                )
                .non_empty()
                .required_message("Message body is required"),
            );
        Self { descriptor, backend, deadline }
    }
}

#[async_trait]
impl Tool for SendSmsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn integration(&self) -> Option<Integration> {
        Some(Integration::Twilio)
    }

    async fn invoke(&self, args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
        let to = args.str("phone_number")?;
        let body = args.str("message_body")?;

        let receipt = with_deadline(self.deadline, SEND_SMS_NOTIFICATION, self.backend.send(to, body)).await?;
        Ok(ToolPayload::SmsSent(receipt))
    }
}

pub struct SentMessagesTool {
    descriptor: ToolDescriptor,
    session: SessionState,
}

impl SentMessagesTool {
    pub fn new(session: SessionState) -> Self {
        Self {
            descriptor: ToolDescriptor::new(GET_SENT_MESSAGES, GET_SENT_DESCRIPTION),
            session,
        }
    }
}

#[async_trait]
impl Tool for SentMessagesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, _args: ValidatedArguments) -> Result<ToolPayload, ToolError> {
        Ok(ToolPayload::SentMessages(self.session.sent_messages().await))
    }
}

/// Tools served by the messaging server, in listing order
pub fn catalogue(
    backend: Arc<dyn MessagingBackend>,
    session: SessionState,
    deadline: Option<Duration>,
) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(SendSmsTool::new(backend, deadline)),
        Box::new(SentMessagesTool::new(session)),
    ]
}
