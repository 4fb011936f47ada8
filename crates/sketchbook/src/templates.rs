/// A named example shader shipped with the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderTemplate {
    pub name: &'static str,
    pub title: &'static str,
    pub source: &'static str,
}

pub const DEFAULT_TEMPLATE: &str = "gradient";

const TEMPLATES: &[ShaderTemplate] = &[
    ShaderTemplate {
        name: "gradient",
        title: "Time-varying gradient",
        source: r"void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    vec3 col = 0.5 + 0.5 * cos(iTime + uv.xyx + vec3(0.0, 2.0, 4.0));
    fragColor = vec4(col, 1.0);
}
",
    },
    ShaderTemplate {
        name: "plasma",
        title: "Plasma",
        source: r"void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = (2.0 * fragCoord - iResolution.xy) / iResolution.y;
    float t = iTime * 0.6;
    float v = sin(uv.x * 3.0 + t);
    v += sin((uv.y * 3.0 + t) * 0.5);
    v += sin((uv.x * 2.0 + uv.y * 2.0 + t) * 0.5);
    vec2 c = uv + vec2(sin(t * 0.33), cos(t * 0.5)) * 1.5;
    v += sin(sqrt(dot(c, c) + 1.0) * 3.0 + t);
    vec3 col = vec3(sin(v * 3.14159), sin(v * 3.14159 + 2.094), sin(v * 3.14159 + 4.188));
    fragColor = vec4(col * 0.5 + 0.5, 1.0);
}
",
    },
    ShaderTemplate {
        name: "rings",
        title: "Concentric rings",
        source: r"void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = (fragCoord - 0.5 * iResolution.xy) / iResolution.y;
    float d = length(uv);
    float rings = 0.5 + 0.5 * sin(40.0 * d - iTime * 4.0);
    float fade = 1.0 - smoothstep(0.0, 0.75, d);
    fragColor = vec4(vec3(rings * fade), 1.0);
}
",
    },
    ShaderTemplate {
        name: "checker",
        title: "Scrolling checkerboard",
        source: r"void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 cell = floor((fragCoord + vec2(iTime * 40.0, 0.0)) / 32.0);
    float checker = mod(cell.x + cell.y, 2.0);
    vec3 col = mix(vec3(0.12, 0.12, 0.16), vec3(0.9, 0.85, 0.7), checker);
    fragColor = vec4(col, 1.0);
}
",
    },
    ShaderTemplate {
        name: "metaballs",
        title: "Metaballs",
        source: r"float ball(vec2 p, vec2 center, float radius) {
    vec2 d = p - center;
    return radius * radius / dot(d, d);
}

void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = (fragCoord - 0.5 * iResolution.xy) / iResolution.y;
    float field = 0.0;
    field += ball(uv, vec2(sin(iTime) * 0.4, cos(iTime * 0.7) * 0.3), 0.12);
    field += ball(uv, vec2(cos(iTime * 1.3) * 0.5, sin(iTime * 0.9) * 0.2), 0.10);
    field += ball(uv, vec2(sin(iTime * 0.5) * 0.2, sin(iTime * 1.7) * 0.35), 0.08);
    float inside = smoothstep(0.9, 1.1, field);
    vec3 col = mix(vec3(0.05, 0.05, 0.1), vec3(1.0, 0.45, 0.2), inside);
    fragColor = vec4(col, 1.0);
}
",
    },
    ShaderTemplate {
        name: "solid",
        title: "Solid white",
        source: r"void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(1.0);
}
",
    },
];

pub fn catalog() -> &'static [ShaderTemplate] {
    TEMPLATES
}

pub fn find_template(name: &str) -> Option<&'static ShaderTemplate> {
    TEMPLATES
        .iter()
        .find(|template| template.name.eq_ignore_ascii_case(name.trim()))
}

/// Template whose source `text` is, ignoring trailing whitespace an editor
/// may have added.
pub fn template_with_source(text: &str) -> Option<&'static ShaderTemplate> {
    let text = text.trim_end();
    TEMPLATES
        .iter()
        .find(|template| template.source.trim_end() == text)
}

pub fn default_template() -> &'static ShaderTemplate {
    find_template(DEFAULT_TEMPLATE).unwrap_or(&TEMPLATES[0])
}

/// Template after `current` in catalog order, wrapping around. Unknown names
/// start from the first entry.
pub fn next_template(current: &str) -> &'static ShaderTemplate {
    match position(current) {
        Some(index) => &TEMPLATES[(index + 1) % TEMPLATES.len()],
        None => &TEMPLATES[0],
    }
}

pub fn previous_template(current: &str) -> &'static ShaderTemplate {
    match position(current) {
        Some(index) => &TEMPLATES[(index + TEMPLATES.len() - 1) % TEMPLATES.len()],
        None => &TEMPLATES[TEMPLATES.len() - 1],
    }
}

fn position(name: &str) -> Option<usize> {
    TEMPLATES
        .iter()
        .position(|template| template.name.eq_ignore_ascii_case(name.trim()))
}
