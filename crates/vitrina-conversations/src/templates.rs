// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static registry of WhatsApp template definitions.
//!
//! Each definition fixes the template's language, the ordered variable keys
//! that fill its `{{1}}..{{n}}` placeholders, and its quick-reply buttons.
//! The body text mirrors the copy approved in the provider console so the
//! message log stores what the customer actually read.

use std::collections::HashMap;

use vitrina_core::VitrinaError;

/// A compile-time template definition.
#[derive(Debug, Clone, Copy)]
pub struct TemplateDefinition {
    pub name: &'static str,
    pub language: &'static str,
    /// Variable keys in `{{1}}..{{n}}` order.
    pub variables: &'static [&'static str],
    /// Quick-reply button labels, in index order.
    pub buttons: &'static [&'static str],
    /// Body copy with positional placeholders.
    pub body: &'static str,
}

pub const CONFIRMACION_PEDIDO: &str = "confirmacion_pedido_contraentrega";
pub const PEDIDO_CONFIRMADO: &str = "pedido_confirmado";
pub const MENU_NO_CONFIRMACION: &str = "menu_no_confirmacion";
pub const TIPO_NOVEDAD: &str = "tipo_novedad_pedido";
pub const CONFIRMAR_CANCELACION: &str = "confirmar_cancelacion_pedido";
pub const MOTIVO_CANCELACION: &str = "motivo_cancelacion_pedido";
pub const PEDIDO_CANCELADO: &str = "pedido_cancelado";
pub const HANDOFF_ASESOR: &str = "handoff_asesor";
pub const NOVEDAD_DIRECCION: &str = "novedad_direccion";
pub const NOVEDAD_FECHA: &str = "novedad_fecha";
pub const NOVEDAD_PRODUCTO: &str = "novedad_producto";

const TEMPLATES: &[TemplateDefinition] = &[
    TemplateDefinition {
        name: CONFIRMACION_PEDIDO,
        language: "es",
        variables: &["customer_name", "order_number"],
        buttons: &["Confirmar pedido", "No confirmar"],
        body: "Hola {{1}}, tu pedido {{2}} está listo para despacho contraentrega. \
               ¿Confirmas tu pedido?",
    },
    TemplateDefinition {
        name: PEDIDO_CONFIRMADO,
        language: "es",
        variables: &["order_number"],
        buttons: &[],
        body: "¡Gracias! Tu pedido {{1}} fue confirmado y será despachado pronto.",
    },
    TemplateDefinition {
        name: MENU_NO_CONFIRMACION,
        language: "es",
        variables: &[],
        buttons: &["Presentar novedad", "Cancelar pedido", "Asesor"],
        body: "Entendido. ¿Qué deseas hacer con tu pedido?",
    },
    TemplateDefinition {
        name: TIPO_NOVEDAD,
        language: "es",
        variables: &[],
        buttons: &[
            "Dirección incorrecta",
            "Cambiar fecha de entrega",
            "Producto equivocado",
        ],
        body: "Cuéntanos qué novedad tienes con tu pedido.",
    },
    TemplateDefinition {
        name: CONFIRMAR_CANCELACION,
        language: "es",
        variables: &["order_number"],
        buttons: &["Sí, cancelar", "No, volver"],
        body: "¿Seguro que deseas cancelar el pedido {{1}}?",
    },
    TemplateDefinition {
        name: MOTIVO_CANCELACION,
        language: "es",
        variables: &[],
        buttons: &[],
        body: "Lamentamos la cancelación. ¿Cuál es el motivo?",
    },
    TemplateDefinition {
        name: PEDIDO_CANCELADO,
        language: "es",
        variables: &["order_number"],
        buttons: &[],
        body: "Tu pedido {{1}} fue cancelado. Gracias por avisarnos.",
    },
    TemplateDefinition {
        name: HANDOFF_ASESOR,
        language: "es",
        variables: &[],
        buttons: &[],
        body: "Un asesor se pondrá en contacto contigo en breve.",
    },
    TemplateDefinition {
        name: NOVEDAD_DIRECCION,
        language: "es",
        variables: &[],
        buttons: &[],
        body: "Registramos la novedad de dirección. Te contactaremos para corregirla.",
    },
    TemplateDefinition {
        name: NOVEDAD_FECHA,
        language: "es",
        variables: &[],
        buttons: &[],
        body: "Registramos el cambio de fecha. Te confirmaremos la nueva entrega.",
    },
    TemplateDefinition {
        name: NOVEDAD_PRODUCTO,
        language: "es",
        variables: &[],
        buttons: &[],
        body: "Registramos la novedad de producto. Revisaremos tu pedido.",
    },
];

/// Look up a template definition by name.
pub fn resolve(name: &str) -> Result<&'static TemplateDefinition, VitrinaError> {
    TEMPLATES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| VitrinaError::NotFound(format!("template '{name}' not found")))
}

impl TemplateDefinition {
    /// Pull this template's body parameters out of a variable map, in
    /// placeholder order. A missing key is a validation error naming it.
    pub fn body_params(
        &self,
        variables: &HashMap<String, String>,
    ) -> Result<Vec<String>, VitrinaError> {
        self.variables
            .iter()
            .map(|key| {
                variables.get(*key).cloned().ok_or_else(|| {
                    VitrinaError::Validation(format!(
                        "template '{}' is missing variable '{key}'",
                        self.name
                    ))
                })
            })
            .collect()
    }

    /// Body copy with placeholders substituted, for the message log.
    pub fn render(&self, params: &[String]) -> String {
        let mut out = self.body.to_string();
        for (i, value) in params.iter().enumerate() {
            out = out.replace(&format!("{{{{{}}}}}", i + 1), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_and_unknown() {
        let def = resolve(CONFIRMACION_PEDIDO).unwrap();
        assert_eq!(def.language, "es");
        assert_eq!(def.buttons, ["Confirmar pedido", "No confirmar"]);
        assert!(matches!(
            resolve("plantilla_inexistente"),
            Err(VitrinaError::NotFound(_))
        ));
    }

    #[test]
    fn body_params_ordered_by_placeholder() {
        let def = resolve(CONFIRMACION_PEDIDO).unwrap();
        let mut vars = HashMap::new();
        vars.insert("order_number".to_string(), "ORD-42".to_string());
        vars.insert("customer_name".to_string(), "Ana".to_string());

        let params = def.body_params(&vars).unwrap();
        assert_eq!(params, ["Ana", "ORD-42"]);

        vars.remove("order_number");
        let err = def.body_params(&vars).unwrap_err();
        assert!(err.to_string().contains("order_number"));
    }

    #[test]
    fn render_substitutes_in_order() {
        let def = resolve(CONFIRMACION_PEDIDO).unwrap();
        let text = def.render(&["Ana".to_string(), "ORD-42".to_string()]);
        assert!(text.contains("Hola Ana"));
        assert!(text.contains("pedido ORD-42"));
        assert!(!text.contains("{{"));
    }
}
