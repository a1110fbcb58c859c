use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};
use novel_workbench::workspace::snapshot::StatusLevel;

#[derive(Debug, Clone)]
pub struct Theme {
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub paper: Color32,
    pub accent: Color32,
    pub accent_muted: Color32,
    pub success: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub radius: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x14, 0x12, 0x10),
            surface_1: Color32::from_rgb(0x1C, 0x19, 0x16),
            surface_2: Color32::from_rgb(0x26, 0x22, 0x1E),
            paper: Color32::from_rgb(0x2D, 0x29, 0x24),
            accent: Color32::from_rgb(0xD9, 0x8E, 0x4A),
            accent_muted: Color32::from_rgb(0xA8, 0x6A, 0x35),
            success: Color32::from_rgb(0x8F, 0xB8, 0x6A),
            danger: Color32::from_rgb(0xE0, 0x5A, 0x4F),
            text_primary: Color32::from_rgb(0xEE, 0xE6, 0xDA),
            text_muted: Color32::from_rgb(0x9C, 0x93, 0x88),
            radius: 8,
        }
    }
}

impl Theme {
    pub const PADDING: i8 = 12;

    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_1;
        visuals.extreme_bg_color = self.paper;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.bg_fill = self.surface_2;
        visuals.widgets.noninteractive.bg_stroke = Stroke::NONE;
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.weak_bg_fill = self.surface_2;
        visuals.widgets.hovered.weak_bg_fill = self.paper;
        visuals.widgets.active.weak_bg_fill = self.accent_muted;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent;
        visuals.window_fill = self.surface_1;
        visuals.window_corner_radius = CornerRadius::same(self.radius);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(18.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_2)
            .inner_margin(Margin::same(Self::PADDING))
            .corner_radius(CornerRadius::same(self.radius))
    }

    pub fn status_color(&self, level: StatusLevel) -> Color32 {
        match level {
            StatusLevel::Info => self.success,
            StatusLevel::Error => self.danger,
        }
    }
}
