use crate::application::convert::ConvertService;

#[derive(Clone)]
pub struct ApiState {
    pub convert: ConvertService,
}

impl ApiState {
    pub fn new(convert: ConvertService) -> Self {
        Self { convert }
    }
}
