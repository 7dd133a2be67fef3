use std::fmt;

/// How a vector was written in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStyle {
    /// `x y z`
    Plain,
    /// `[x y z]`, as used by dispinfo startposition.
    Bracketed,
}

/// Three floats. Dual-purpose: a Cartesian point/direction, or Euler angles
/// stored as (pitch, yaw, roll) degrees depending on the consuming field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub style: VectorStyle,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 {
            x,
            y,
            z,
            style: VectorStyle::Plain,
        }
    }

    pub fn zero() -> Self {
        Vector3::new(0.0, 0.0, 0.0)
    }

    /// Angle accessors: angle vectors are stored "pitch yaw roll".
    pub fn pitch(&self) -> f64 {
        self.x
    }

    pub fn yaw(&self) -> f64 {
        self.y
    }

    pub fn roll(&self) -> f64 {
        self.z
    }

    /// Parse a vector token, accepting `x y z` and `[x y z]` forms.
    /// Only succeeds when re-rendering reproduces the source text exactly.
    pub fn parse(text: &str) -> Option<Vector3> {
        let (inner, style) = match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            Some(inner) => (inner, VectorStyle::Bracketed),
            None => (text, VectorStyle::Plain),
        };

        let mut components = [0.0f64; 3];
        let mut count = 0;
        for token in inner.split(' ') {
            if count == 3 {
                return None;
            }
            components[count] = parse_component(token)?;
            count += 1;
        }
        if count != 3 {
            return None;
        }

        let vector = Vector3 {
            x: components[0],
            y: components[1],
            z: components[2],
            style,
        };
        if vector.to_string() == text {
            Some(vector)
        } else {
            None
        }
    }

    /// Rotate this vector by Euler angles in degrees: roll about +X, pitch
    /// about -Y, yaw about +Z (the engine's angle-matrix convention).
    pub fn rotate(&mut self, angles: &Vector3) {
        let (sp, cp) = angles.pitch().to_radians().sin_cos();
        let (sy, cy) = angles.yaw().to_radians().sin_cos();
        let (sr, cr) = angles.roll().to_radians().sin_cos();

        let (x, y, z) = (self.x, self.y, self.z);
        self.x = snap(cp * cy * x + (sr * sp * cy - cr * sy) * y + (cr * sp * cy + sr * sy) * z);
        self.y = snap(cp * sy * x + (sr * sp * sy + cr * cy) * y + (cr * sp * sy - sr * cy) * z);
        self.z = snap(-sp * x + sr * cp * y + cr * cp * z);
    }

    /// Compose angle values: component-wise addition of pitch/yaw/roll.
    pub fn add_angles(&mut self, angles: &Vector3) {
        self.x += angles.x;
        self.y += angles.y;
        self.z += angles.z;
    }

    pub fn offset(&mut self, translation: &Vector3) {
        self.x += translation.x;
        self.y += translation.y;
        self.z += translation.z;
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, z) = (
            format_component(self.x),
            format_component(self.y),
            format_component(self.z),
        );
        match self.style {
            VectorStyle::Plain => write!(f, "{} {} {}", x, y, z),
            VectorStyle::Bracketed => write!(f, "[{} {} {}]", x, y, z),
        }
    }
}

/// How a vector sequence was written in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayStyle {
    /// `x y z x y z ...`, displacement row data.
    Bare,
    /// `(x y z) (x y z) ...`, side plane definitions.
    Parenthesized,
}

/// A sequence of Vector3 encoded in one textual value.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector3Array {
    pub rows: Vec<Vector3>,
    pub style: ArrayStyle,
}

impl Vector3Array {
    /// Parse a bare row of floats whose count is a positive multiple of three.
    pub fn parse_bare(text: &str) -> Option<Vector3Array> {
        let mut components = Vec::new();
        for token in text.split(' ') {
            components.push(parse_component(token)?);
        }
        if components.is_empty() || components.len() % 3 != 0 {
            return None;
        }

        let rows = components
            .chunks(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        let array = Vector3Array {
            rows,
            style: ArrayStyle::Bare,
        };
        if array.to_string() == text {
            Some(array)
        } else {
            None
        }
    }

    /// Parse one or more parenthesized triples: `(x y z) (x y z) ...`.
    pub fn parse_parenthesized(text: &str) -> Option<Vector3Array> {
        let mut rows = Vec::new();
        for group in text.split(") ") {
            let group = group.strip_prefix('(')?;
            let group = group.strip_suffix(')').unwrap_or(group);
            let mut components = [0.0f64; 3];
            let mut count = 0;
            for token in group.split(' ') {
                if count == 3 {
                    return None;
                }
                components[count] = parse_component(token)?;
                count += 1;
            }
            if count != 3 {
                return None;
            }
            rows.push(Vector3::new(components[0], components[1], components[2]));
        }
        if rows.is_empty() {
            return None;
        }

        let array = Vector3Array {
            rows,
            style: ArrayStyle::Parenthesized,
        };
        if array.to_string() == text {
            Some(array)
        } else {
            None
        }
    }

    pub fn rotate(&mut self, angles: &Vector3) {
        for row in &mut self.rows {
            row.rotate(angles);
        }
    }

    pub fn offset(&mut self, translation: &Vector3) {
        for row in &mut self.rows {
            row.offset(translation);
        }
    }
}

impl fmt::Display for Vector3Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match self.style {
                ArrayStyle::Bare => write!(f, "{}", row)?,
                ArrayStyle::Parenthesized => write!(f, "({})", row)?,
            }
        }
        Ok(())
    }
}

/// A property value, typed lazily from the raw token text. A token is only
/// adopted as a typed variant when re-rendering reproduces the source text
/// exactly; anything else stays `Text` and survives round-trips verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Vector3(Vector3),
    Vector3Array(Vector3Array),
}

impl Value {
    /// Type a raw token: number, vector, parenthesized vector list, or text.
    pub fn parse(text: &str) -> Value {
        if let Some(n) = parse_component(text) {
            return Value::Number(n);
        }
        if let Some(v) = Vector3::parse(text) {
            return Value::Vector3(v);
        }
        if text.starts_with('(') {
            if let Some(array) = Vector3Array::parse_parenthesized(text) {
                return Value::Vector3Array(array);
            }
        }
        Value::Text(text.to_string())
    }

    /// Type a displacement-row token: a bare float sequence, or text.
    pub fn parse_row(text: &str) -> Value {
        match Vector3Array::parse_bare(text) {
            Some(array) => Value::Vector3Array(array),
            None => Value::Text(text.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<&Vector3> {
        match self {
            Value::Vector3(v) => Some(v),
            _ => None,
        }
    }

    /// Rotate by Euler angles. Non-vector variants are untouched.
    pub fn rotate(&mut self, angles: &Vector3) {
        match self {
            Value::Vector3(v) => v.rotate(angles),
            Value::Vector3Array(a) => a.rotate(angles),
            Value::Text(_) | Value::Number(_) => {}
        }
    }

    /// Compose angles. Non-vector variants are untouched.
    pub fn add_angles(&mut self, angles: &Vector3) {
        match self {
            Value::Vector3(v) => v.add_angles(angles),
            Value::Text(_) | Value::Number(_) | Value::Vector3Array(_) => {}
        }
    }

    /// Translate. Non-vector variants are untouched.
    pub fn offset(&mut self, translation: &Vector3) {
        match self {
            Value::Vector3(v) => v.offset(translation),
            Value::Vector3Array(a) => a.offset(translation),
            Value::Text(_) | Value::Number(_) => {}
        }
    }

    /// Offset every numeric identifier in this value. Used for `sidelist`
    /// style fields, which hold one id or a space-separated id list.
    pub fn offset_identifiers(&mut self, offset: i64) {
        match self {
            Value::Number(n) => *n += offset as f64,
            Value::Vector3(v) => {
                v.x += offset as f64;
                v.y += offset as f64;
                v.z += offset as f64;
            }
            Value::Text(text) => {
                let shifted: Vec<String> = text
                    .split(' ')
                    .map(|token| match token.parse::<i64>() {
                        Ok(id) => (id + offset).to_string(),
                        Err(_) => token.to_string(),
                    })
                    .collect();
                *text = shifted.join(" ");
            }
            Value::Vector3Array(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", format_component(*n)),
            Value::Vector3(v) => write!(f, "{}", v),
            Value::Vector3Array(a) => write!(f, "{}", a),
        }
    }
}

/// Parse one float token, accepting it only if it renders back identically.
fn parse_component(token: &str) -> Option<f64> {
    if token.is_empty() {
        return None;
    }
    let n: f64 = token.parse().ok()?;
    if format_component(n) == token {
        Some(n)
    } else {
        None
    }
}

fn format_component(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Snap rotation results to the nearest integer when within float noise of
/// it, so axis-aligned rotations stay exact.
fn snap(n: f64) -> f64 {
    let rounded = n.round();
    if (n - rounded).abs() < 1e-6 { rounded } else { n }
}
