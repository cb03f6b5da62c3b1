//! Conversions from domain values to the shared response DTOs.

use crate::domain::{DeleteConfirmation, IdentityStep, NutritionItem};
use crate::error::ValidationError;
use shared::{
    DeleteRequestResponse, HistoryEntry, HistoryListResponse, IdentityValidationResponse, NutritionInfo,
    NutritionListResponse, SaveSessionResponse, Screen, UserNotice,
};

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this record?";

pub struct IdentityMapper;

impl IdentityMapper {
    /// Gate result for the identity form; the handoff is only set when advancing is allowed
    pub fn to_validation_dto(step: &IdentityStep) -> IdentityValidationResponse {
        match step.advance() {
            Ok(handoff) => IdentityValidationResponse {
                can_advance: true,
                errors: Vec::new(),
                handoff: Some(handoff.as_str().to_string()),
            },
            Err(_) => IdentityValidationResponse {
                can_advance: false,
                errors: step.errors().iter().map(ValidationError::to_field_error).collect(),
                handoff: None,
            },
        }
    }
}

pub struct SessionMapper;

impl SessionMapper {
    pub fn to_save_dto(entry: HistoryEntry) -> SaveSessionResponse {
        SaveSessionResponse {
            entry,
            navigate_to: Screen::History,
            notice: UserNotice::info("Data saved", "Data was saved to the history."),
        }
    }
}

pub struct HistoryMapper;

impl HistoryMapper {
    pub fn to_list_dto(entries: Vec<HistoryEntry>, total: usize, query: Option<String>) -> HistoryListResponse {
        HistoryListResponse { entries, total, query }
    }

    pub fn to_delete_request_dto(confirmation: DeleteConfirmation) -> DeleteRequestResponse {
        DeleteRequestResponse {
            id: confirmation.id,
            confirmation_token: confirmation.token,
            prompt: DELETE_PROMPT.to_string(),
        }
    }
}

pub struct NutritionMapper;

impl NutritionMapper {
    pub fn to_dto(item: &NutritionItem) -> NutritionInfo {
        NutritionInfo {
            id: item.id,
            name: item.name.to_string(),
            protein: item.protein,
            carbohydrate: item.carbohydrate,
            fat: item.fat,
            fiber: item.fiber,
        }
    }

    pub fn to_list_dto(items: &[NutritionItem]) -> NutritionListResponse {
        NutritionListResponse {
            items: items.iter().map(Self::to_dto).collect(),
        }
    }
}
