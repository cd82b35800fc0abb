use serde::Serialize;

use crate::errors::ServiceError;
use crate::types::Language;

/// A user-facing message in both supported languages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedMessage {
    pub en: String,
    pub ar: String,
}

impl LocalizedMessage {
    fn new(en: &str, ar: &str) -> Self {
        Self {
            en: en.to_string(),
            ar: ar.to_string(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::En => &self.en,
            Language::Ar => &self.ar,
        }
    }
}

/// Fixed messages for the codes the client knows about
fn message_for_code(code: &str) -> Option<LocalizedMessage> {
    let message = match code {
        "NETWORK_ERROR" => LocalizedMessage::new(
            "Cannot reach the server. Please check your internet connection.",
            "لا يمكن الاتصال بالخادم. يرجى التحقق من اتصال الإنترنت.",
        ),
        "TIMEOUT" => LocalizedMessage::new(
            "The request took too long. Please try again.",
            "استغرق الطلب وقتاً طويلاً. يرجى المحاولة مرة أخرى.",
        ),
        "RATE_LIMITED" => LocalizedMessage::new(
            "Too many requests. Please wait before trying again.",
            "طلبات كثيرة جداً. يرجى الانتظار قبل المحاولة مرة أخرى.",
        ),
        "UNAUTHORIZED" => LocalizedMessage::new(
            "Your session has expired. Please log in again.",
            "انتهت صلاحية الجلسة. يرجى تسجيل الدخول مرة أخرى.",
        ),
        "FORBIDDEN" => LocalizedMessage::new(
            "You do not have permission to perform this action.",
            "ليس لديك صلاحية لتنفيذ هذا الإجراء.",
        ),
        "NOT_FOUND" => LocalizedMessage::new(
            "The requested item was not found.",
            "العنصر المطلوب غير موجود.",
        ),
        "VALIDATION_ERROR" => LocalizedMessage::new(
            "Some of the submitted data is invalid.",
            "بعض البيانات المدخلة غير صالحة.",
        ),
        "UNSUPPORTED_FILE_TYPE" => LocalizedMessage::new(
            "Unsupported file type. Please upload an Excel, CSV or JSON file.",
            "نوع الملف غير مدعوم. يرجى رفع ملف Excel أو CSV أو JSON.",
        ),
        "FILE_TOO_LARGE" => LocalizedMessage::new(
            "The file is too large.",
            "حجم الملف كبير جداً.",
        ),
        "SERVER_ERROR" => LocalizedMessage::new(
            "A server error occurred. Please try again later.",
            "حدث خطأ في الخادم. يرجى المحاولة لاحقاً.",
        ),
        "ALREADY_PENDING" => LocalizedMessage::new(
            "A request is already in progress.",
            "هناك طلب قيد التنفيذ بالفعل.",
        ),
        _ => return None,
    };
    Some(message)
}

fn fallback() -> LocalizedMessage {
    LocalizedMessage::new("An unexpected error occurred.", "حدث خطأ غير متوقع")
}

impl ServiceError {
    /// Bilingual message for display. Backend-supplied text wins over the
    /// built-in table so server-side wording reaches the user unchanged.
    pub fn localized(&self) -> LocalizedMessage {
        let builtin = message_for_code(self.code());
        match self {
            ServiceError::Api(api) if !api.message.is_empty() || api.message_ar.is_some() => {
                let base = builtin.unwrap_or_else(fallback);
                LocalizedMessage {
                    en: if api.message.is_empty() { base.en } else { api.message.clone() },
                    ar: api.message_ar.clone().unwrap_or(base.ar),
                }
            }
            ServiceError::Domain(crate::errors::DomainError::Validation(err)) => {
                let base = builtin.unwrap_or_else(fallback);
                LocalizedMessage {
                    en: err.to_string(),
                    ar: base.ar,
                }
            }
            _ => builtin.unwrap_or_else(fallback),
        }
    }

    pub fn user_message(&self, language: Language) -> String {
        self.localized().get(language).to_string()
    }
}
