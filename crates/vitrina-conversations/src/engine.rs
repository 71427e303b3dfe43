// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The order-confirmation state machine.
//!
//! Pure and deterministic: given a state and an utterance it either names
//! the same transition every time or refuses with a conflict. Utterances
//! match quick-reply labels literally (after trimming); only the
//! cancellation-reason state accepts free text. Terminal states accept
//! nothing.

use vitrina_core::{ConversationState, VitrinaError};

use crate::templates;

/// Domain event carried by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    OrderConfirmed,
    OrderCancelled { reason: String },
    NoveltyRequested { novelty_type: String },
    HandoffRequested,
}

impl DomainEvent {
    /// Channel event type for the business events publisher.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderConfirmed => "order.confirmed",
            DomainEvent::OrderCancelled { .. } => "order.cancelled",
            DomainEvent::NoveltyRequested { .. } => "novelty.requested",
            DomainEvent::HandoffRequested => "handoff.requested",
        }
    }
}

/// The engine's verdict on one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub next_state: ConversationState,
    /// Template to send before committing the new state, if any.
    pub reply_template: Option<&'static str>,
    pub event: Option<DomainEvent>,
}

/// The three novelty quick replies, with their wire tag and reply template.
const NOVELTY_OPTIONS: &[(&str, &str, &str)] = &[
    ("Dirección incorrecta", "direccion_incorrecta", templates::NOVEDAD_DIRECCION),
    ("Cambiar fecha de entrega", "cambio_fecha_entrega", templates::NOVEDAD_FECHA),
    ("Producto equivocado", "producto_equivocado", templates::NOVEDAD_PRODUCTO),
];

fn invalid(state: ConversationState, utterance: &str) -> VitrinaError {
    VitrinaError::Conflict(format!(
        "utterance '{utterance}' is not valid in state {state}"
    ))
}

/// Decide the transition for an utterance. Does not mutate anything.
pub fn transition(
    state: ConversationState,
    utterance: &str,
) -> Result<StateTransition, VitrinaError> {
    let text = utterance.trim();

    match state {
        ConversationState::AwaitingConfirmation => match text {
            "Confirmar pedido" => Ok(StateTransition {
                next_state: ConversationState::Completed,
                reply_template: Some(templates::PEDIDO_CONFIRMADO),
                event: Some(DomainEvent::OrderConfirmed),
            }),
            "No confirmar" => Ok(StateTransition {
                next_state: ConversationState::AwaitingMenuSelection,
                reply_template: Some(templates::MENU_NO_CONFIRMACION),
                event: None,
            }),
            _ => Err(invalid(state, text)),
        },

        ConversationState::AwaitingMenuSelection => match text {
            "Presentar novedad" => Ok(StateTransition {
                next_state: ConversationState::AwaitingNoveltyType,
                reply_template: Some(templates::TIPO_NOVEDAD),
                event: None,
            }),
            "Cancelar pedido" => Ok(StateTransition {
                next_state: ConversationState::AwaitingCancelConfirm,
                reply_template: Some(templates::CONFIRMAR_CANCELACION),
                event: None,
            }),
            "Asesor" => Ok(StateTransition {
                next_state: ConversationState::HandoffToHuman,
                reply_template: Some(templates::HANDOFF_ASESOR),
                event: Some(DomainEvent::HandoffRequested),
            }),
            _ => Err(invalid(state, text)),
        },

        ConversationState::AwaitingNoveltyType => NOVELTY_OPTIONS
            .iter()
            .find(|(label, _, _)| *label == text)
            .map(|(_, tag, template)| StateTransition {
                next_state: ConversationState::Completed,
                reply_template: Some(template),
                event: Some(DomainEvent::NoveltyRequested {
                    novelty_type: (*tag).to_string(),
                }),
            })
            .ok_or_else(|| invalid(state, text)),

        ConversationState::AwaitingCancelConfirm => match text {
            "Sí, cancelar" => Ok(StateTransition {
                next_state: ConversationState::AwaitingCancelReason,
                reply_template: Some(templates::MOTIVO_CANCELACION),
                event: None,
            }),
            "No, volver" => Ok(StateTransition {
                next_state: ConversationState::AwaitingMenuSelection,
                reply_template: Some(templates::MENU_NO_CONFIRMACION),
                event: None,
            }),
            _ => Err(invalid(state, text)),
        },

        // Any free text is the cancellation reason.
        ConversationState::AwaitingCancelReason => Ok(StateTransition {
            next_state: ConversationState::Completed,
            reply_template: Some(templates::PEDIDO_CANCELADO),
            event: Some(DomainEvent::OrderCancelled {
                reason: text.to_string(),
            }),
        }),

        // START only transitions via the initial outbound send, and terminal
        // states accept nothing.
        ConversationState::Start
        | ConversationState::Completed
        | ConversationState::HandoffToHuman => Err(invalid(state, text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_branches() {
        let t = transition(ConversationState::AwaitingConfirmation, "Confirmar pedido").unwrap();
        assert_eq!(t.next_state, ConversationState::Completed);
        assert_eq!(t.reply_template, Some(templates::PEDIDO_CONFIRMADO));
        assert_eq!(t.event, Some(DomainEvent::OrderConfirmed));

        let t = transition(ConversationState::AwaitingConfirmation, "No confirmar").unwrap();
        assert_eq!(t.next_state, ConversationState::AwaitingMenuSelection);
        assert!(t.event.is_none());
    }

    #[test]
    fn menu_branches() {
        let t = transition(ConversationState::AwaitingMenuSelection, "Asesor").unwrap();
        assert_eq!(t.next_state, ConversationState::HandoffToHuman);
        assert_eq!(t.event, Some(DomainEvent::HandoffRequested));

        let t = transition(ConversationState::AwaitingMenuSelection, "Presentar novedad").unwrap();
        assert_eq!(t.next_state, ConversationState::AwaitingNoveltyType);

        let t = transition(ConversationState::AwaitingMenuSelection, "Cancelar pedido").unwrap();
        assert_eq!(t.next_state, ConversationState::AwaitingCancelConfirm);
    }

    #[test]
    fn novelty_labels_map_to_their_templates() {
        let t = transition(ConversationState::AwaitingNoveltyType, "Dirección incorrecta").unwrap();
        assert_eq!(t.reply_template, Some(templates::NOVEDAD_DIRECCION));
        assert_eq!(
            t.event,
            Some(DomainEvent::NoveltyRequested {
                novelty_type: "direccion_incorrecta".to_string()
            })
        );

        assert!(transition(ConversationState::AwaitingNoveltyType, "Otra cosa").is_err());
    }

    #[test]
    fn cancel_flow_captures_free_text_reason() {
        let t = transition(ConversationState::AwaitingCancelConfirm, "Sí, cancelar").unwrap();
        assert_eq!(t.next_state, ConversationState::AwaitingCancelReason);

        let t = transition(ConversationState::AwaitingCancelConfirm, "No, volver").unwrap();
        assert_eq!(t.next_state, ConversationState::AwaitingMenuSelection);

        let t = transition(
            ConversationState::AwaitingCancelReason,
            "Llegó después de lo esperado",
        )
        .unwrap();
        assert_eq!(t.next_state, ConversationState::Completed);
        assert_eq!(
            t.event,
            Some(DomainEvent::OrderCancelled {
                reason: "Llegó después de lo esperado".to_string()
            })
        );
    }

    #[test]
    fn terminal_and_start_states_accept_nothing() {
        for state in [
            ConversationState::Start,
            ConversationState::Completed,
            ConversationState::HandoffToHuman,
        ] {
            assert!(matches!(
                transition(state, "Confirmar pedido"),
                Err(VitrinaError::Conflict(_))
            ));
        }
    }

    #[test]
    fn unknown_utterance_is_rejected_without_effect() {
        assert!(transition(ConversationState::AwaitingConfirmation, "hola?").is_err());
    }

    #[test]
    fn transitions_are_deterministic() {
        let a = transition(ConversationState::AwaitingConfirmation, "Confirmar pedido").unwrap();
        let b = transition(ConversationState::AwaitingConfirmation, "Confirmar pedido").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn utterances_are_trimmed() {
        let t = transition(ConversationState::AwaitingConfirmation, "  Confirmar pedido  ")
            .unwrap();
        assert_eq!(t.next_state, ConversationState::Completed);
    }
}
