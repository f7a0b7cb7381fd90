use geo::{Area, Polygon};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// First error reason, for log lines
    pub fn summary(&self) -> Option<String> {
        self.errors.first().map(|e| format!("{}: {}", e.location, e.reason))
    }
}

/// Validate a footprint polygon.
///
/// Beyond ring structure, a footprint must enclose a positive finite area;
/// anything else cannot take part in adjacency or area measurement.
pub fn validate_footprint(polygon: &Polygon<f64>) -> ValidationResult {
    let mut result = validate_polygon(polygon);

    let area = polygon.unsigned_area();
    if !area.is_finite() || area <= 0.0 {
        result.add_error("Polygon".to_string(), format!("Polygon area must be positive, found {}", area));
    }

    result
}

fn validate_polygon(polygon: &Polygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    // Check exterior ring
    let exterior = polygon.exterior();
    if exterior.0.len() < 4 {
        result.add_error(
            "Polygon exterior".to_string(),
            format!("Polygon exterior must have at least 4 points, found {}", exterior.0.len()),
        );
    }

    // Polygon::new always closes the exterior
    for (i, coord) in exterior.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            result.add_error(format!("Polygon exterior[{}]", i), "Coordinates must be finite".to_string());
        }
    }

    result
}
